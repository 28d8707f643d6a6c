// src/pipeline.rs - Measurement chain from grayscale scan to feature rows

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use image::{GrayImage, Luma, Rgb, RgbImage};

use crate::buckets;
use crate::components::filter_components;
use crate::config::{Config, RootType};
use crate::errors::{Result, RootMorphError};
use crate::features::FeatureVector;
use crate::image_io::InputImage;
use crate::overlay;
use crate::pruning;
use crate::roi::{self, Region};
use crate::segmentation;
use crate::skeleton::{self, DistanceField, Skeleton, SkeletonGraph};
use crate::topology;
use crate::units;

/// Cooperative cancellation flag shared between a running batch and its
/// caller. Checked between images and between regions, never mid-stage.
#[derive(Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Measurements and rendered images for one region of one input image
pub struct RegionAnalysis {
    pub region: String,
    pub features: FeatureVector,
    /// Root length per rounded pixel diameter, indexed by diameter
    pub length_profile: Vec<f64>,
    pub segmented: Option<GrayImage>,
    pub processed: Option<RgbImage>,
}

/// Per-region results for one input image, plus image-sized composites
/// of the region renderings for saving to disk
pub struct ImageAnalysis {
    /// File name with extension, as written to the feature CSV
    pub filename: String,
    pub regions: Vec<RegionAnalysis>,
    pub segmented: Option<GrayImage>,
    pub processed: Option<RgbImage>,
}

/// Analyze one input image, once per region of interest.
///
/// Without regions the whole image is analyzed as the single region
/// "Full". A region that does not fit inside the image is reported and
/// analyzed as the full image instead, so its row is never silently
/// missing from the output CSV.
pub fn process_image(
    input: &InputImage,
    regions: &[Region],
    config: &Config,
    cancel: &CancelToken,
) -> Result<ImageAnalysis> {
    let filename = input
        .path
        .file_name()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| input.filename.clone());

    let (width, height) = input.image.dimensions();

    // Region renderings are pasted back at their rectangles, so one
    // saved image covers every region of the scan
    let mut segmented_canvas = if config.save_segmented {
        Some(GrayImage::from_pixel(width, height, Luma([255])))
    } else {
        None
    };
    let mut processed_canvas = if config.save_processed {
        Some(RgbImage::from_pixel(width, height, Rgb([255, 255, 255])))
    } else {
        None
    };

    let mut analyses = Vec::new();

    if regions.is_empty() {
        let analysis = analyze_region(&input.image, roi::FULL_IMAGE, config)?;
        paste_gray(&mut segmented_canvas, &analysis.segmented, 0, 0);
        paste_rgb(&mut processed_canvas, &analysis.processed, 0, 0);
        analyses.push(analysis);
    } else {
        for region in regions {
            if cancel.is_cancelled() {
                break;
            }

            if region.is_empty() {
                eprintln!(
                    "Warning: Ignoring the region-of-interest '{}', as it has zero area.",
                    region.name
                );
                continue;
            }

            if region.fits(width, height) {
                let view = roi::crop(&input.image, region);
                let analysis = analyze_region(&view, &region.name, config)?;
                paste_gray(&mut segmented_canvas, &analysis.segmented, region.x, region.y);
                paste_rgb(&mut processed_canvas, &analysis.processed, region.x, region.y);
                analyses.push(analysis);
            } else {
                eprintln!(
                    "Warning: Ignoring the region-of-interest '{}', as it is out-of-bounds for the image {}.",
                    region.name, filename
                );
                let analysis = analyze_region(&input.image, &region.name, config)?;
                paste_gray(&mut segmented_canvas, &analysis.segmented, 0, 0);
                paste_rgb(&mut processed_canvas, &analysis.processed, 0, 0);
                analyses.push(analysis);
            }
        }
    }

    Ok(ImageAnalysis {
        filename,
        regions: analyses,
        segmented: segmented_canvas,
        processed: processed_canvas,
    })
}

fn paste_gray(canvas: &mut Option<GrayImage>, tile: &Option<GrayImage>, x: u32, y: u32) {
    if let (Some(canvas), Some(tile)) = (canvas.as_mut(), tile.as_ref()) {
        image::imageops::replace(canvas, tile, x as i64, y as i64);
    }
}

fn paste_rgb(canvas: &mut Option<RgbImage>, tile: &Option<RgbImage>, x: u32, y: u32) {
    if let (Some(canvas), Some(tile)) = (canvas.as_mut(), tile.as_ref()) {
        image::imageops::replace(canvas, tile, x as i64, y as i64);
    }
}

/// Run the measurement stages on one grayscale view.
///
/// A view with no root pixels after filtering, or one whose skeleton
/// carries no measurable content, yields an all-NA feature vector
/// instead of an error so a batch keeps one row per region.
pub fn analyze_region(view: &GrayImage, region: &str, config: &Config) -> Result<RegionAnalysis> {
    let started = Instant::now();
    let bucket_count = config.diameter_ranges.len() + 1;

    let mask = segmentation::segment(view, config, region)?;
    let (cleaned, stats) = filter_components(&mask, config);

    let removed = stats.removed_foreground + stats.discarded_by_keep_largest;
    if config.verbose && (removed > 0 || stats.filled_holes > 0) {
        println!(
            "  {}: removed {} component(s), filled {} hole(s)",
            region, removed, stats.filled_holes
        );
    }

    let Skeleton {
        distance,
        mut graph,
    } = match skeleton::build(&cleaned, region) {
        Ok(skeleton) => skeleton,
        Err(RootMorphError::DegenerateSkeleton(_)) => {
            return Ok(unmeasured_region(&cleaned, region, config));
        }
        Err(e) => return Err(e),
    };

    // Pruning is a broken-root concept: short terminal spurs are
    // measurement artifacts of washed fragments, not real laterals
    if config.enable_pruning && config.root_type == RootType::Broken {
        let pruned = pruning::prune(&mut graph, config.pruning_threshold as f64);
        if config.verbose && pruned > 0 {
            println!("  {}: pruned {} spurious segment(s)", region, pruned);
        }
    }

    let features = match topology::analyze(&graph, &cleaned, config.root_type, region) {
        Ok(mut features) => {
            let ranges = config.ranges_in_pixels();
            let buckets = buckets::bucket_by_diameter(&graph, &ranges);
            features.volume = buckets.total_volume();
            features.surface_area = buckets.total_surface_area();
            features.bucket_lengths = buckets.lengths;
            features.bucket_projected_areas = buckets.projected_areas;
            features.bucket_surface_areas = buckets.surface_areas;
            features.bucket_volumes = buckets.volumes;

            if config.convert_units {
                units::apply_factor(&mut features, config.unit_factor());
            }
            features.computation_time = started.elapsed().as_secs_f64();
            features
        }
        Err(RootMorphError::EmptyTopology(_)) => FeatureVector::unmeasured(bucket_count),
        Err(e) => return Err(e),
    };

    let length_profile = buckets::length_by_diameter(&graph);

    let segmented = if config.save_segmented {
        Some(overlay::render_segmented(&cleaned))
    } else {
        None
    };

    let processed = if config.save_processed {
        Some(overlay::render_processed(
            &cleaned,
            &distance,
            &graph,
            &config.ranges_in_pixels(),
            config,
        ))
    } else {
        None
    };

    Ok(RegionAnalysis {
        region: region.to_string(),
        features,
        length_profile,
        segmented,
        processed,
    })
}

/// Result for a region with no root pixels: an all-NA feature row plus
/// blank renderings, so the output still carries one entry per region
fn unmeasured_region(cleaned: &GrayImage, region: &str, config: &Config) -> RegionAnalysis {
    let (width, height) = cleaned.dimensions();

    let segmented = if config.save_segmented {
        Some(overlay::render_segmented(cleaned))
    } else {
        None
    };

    let processed = if config.save_processed {
        let empty = SkeletonGraph {
            width,
            height,
            nodes: Vec::new(),
            segments: Vec::new(),
        };
        let distance = DistanceField::from_mask(cleaned);
        Some(overlay::render_processed(
            cleaned,
            &distance,
            &empty,
            &config.ranges_in_pixels(),
            config,
        ))
    } else {
        None
    };

    RegionAnalysis {
        region: region.to_string(),
        features: FeatureVector::unmeasured(config.diameter_ranges.len() + 1),
        length_profile: Vec::new(),
        segmented,
        processed,
    }
}
