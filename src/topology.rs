// src/topology.rs - Measurement of the skeleton graph and the cleaned mask

use image::{GrayImage, Luma};
use imageproc::drawing::{draw_line_segment_mut, draw_polygon_mut};
use imageproc::geometry::{arc_length, convex_hull};
use imageproc::point::Point;

use crate::components;
use crate::config::RootType;
use crate::errors::{Result, RootMorphError};
use crate::features::FeatureVector;
use crate::segmentation;
use crate::skeleton::SkeletonGraph;

/// Lookahead along the pixel chain when estimating local orientation
const ANGLE_WINDOW: usize = 3;

/// Measure the skeleton graph against its cleaned mask.
///
/// Fills every scalar feature of the vector except volume, surface area,
/// the diameter range vectors and the computation time, which come from
/// the diameter bucketing stage. Whole-root columns are computed only in
/// whole-root mode and stay NaN otherwise.
pub fn analyze(
    graph: &SkeletonGraph,
    mask: &GrayImage,
    root_type: RootType,
    name: &str,
) -> Result<FeatureVector> {
    if graph.is_empty() {
        return Err(RootMorphError::EmptyTopology(format!(
            "no skeleton content in {}",
            name
        )));
    }

    let mut features = FeatureVector::unmeasured(0);

    features.tip_count = graph.tip_count() as f64;
    features.branch_count = graph.branch_count() as f64;
    features.total_length = graph.total_length();
    features.branching_frequency = features.branch_count / features.total_length;

    features.network_area = segmentation::foreground_area(mask) as f64;
    features.perimeter = perimeter(mask);

    let mut diameters = diameter_samples(graph);
    if diameters.is_empty() {
        features.average_diameter = f64::NAN;
        features.median_diameter = f64::NAN;
        features.maximum_diameter = f64::NAN;
    } else {
        features.average_diameter =
            diameters.iter().sum::<f64>() / diameters.len() as f64;
        features.median_diameter = median(&mut diameters);
        features.maximum_diameter = diameters.iter().cloned().fold(0.0, f64::max);
    }

    if root_type == RootType::Whole {
        measure_whole_root(graph, mask, &mut features);
    }

    Ok(features)
}

fn measure_whole_root(graph: &SkeletonGraph, mask: &GrayImage, features: &mut FeatureVector) {
    let mut counts: Vec<f64> = scanline_root_counts(&graph.to_mask())
        .into_iter()
        .map(|c| c as f64)
        .collect();
    if !counts.is_empty() {
        features.max_roots = counts.iter().cloned().fold(0.0, f64::max);
        features.median_roots = median(&mut counts);
    }

    if let Some((_, min_y, _, max_y)) = mask_bounds(mask) {
        let depth = (max_y - min_y + 1) as f64;
        features.depth = depth;
        features.max_width = widest_row(mask) as f64;
        features.width_depth_ratio = features.max_width / depth;
        features.lower_root_area = lower_area(mask, min_y, depth) as f64;
    }

    features.convex_area = convex_area(mask);
    features.solidity = features.network_area / features.convex_area;

    let hole_areas = components::enclosed_hole_areas(mask);
    features.hole_count = hole_areas.len() as f64;
    let total_hole_area: u64 = hole_areas.iter().sum();
    features.average_hole_size = total_hole_area as f64 / hole_areas.len() as f64;

    let (average, shallow, medium, steep) = orientation_statistics(graph);
    features.average_orientation = average;
    features.shallow_angle_frequency = shallow;
    features.medium_angle_frequency = medium;
    features.steep_angle_frequency = steep;
}

/// Local diameter at every distinct skeleton pixel. Junction pixels
/// shared by several segments are sampled once.
fn diameter_samples(graph: &SkeletonGraph) -> Vec<f64> {
    let mut seen = vec![false; (graph.width * graph.height) as usize];
    let mut samples = Vec::new();
    for segment in &graph.segments {
        for (&(x, y), &radius) in segment.pixels.iter().zip(segment.radii.iter()) {
            let index = (y * graph.width + x) as usize;
            if !seen[index] {
                seen[index] = true;
                samples.push(2.0 * radius);
            }
        }
    }
    samples
}

fn median(samples: &mut [f64]) -> f64 {
    if samples.is_empty() {
        return f64::NAN;
    }
    samples.sort_by(f64::total_cmp);
    let n = samples.len();
    if n % 2 == 1 {
        samples[n / 2]
    } else {
        (samples[n / 2 - 1] + samples[n / 2]) / 2.0
    }
}

/// Summed closed arc length of the outer contours of the mask
fn perimeter(mask: &GrayImage) -> f64 {
    segmentation::outer_contours(mask)
        .iter()
        .map(|points| arc_length(points, true))
        .sum()
}

/// Number of root crossings per image row: each maximal horizontal run
/// of skeleton pixels counts as one root. Rows without skeleton pixels
/// are skipped.
fn scanline_root_counts(skeleton_mask: &GrayImage) -> Vec<u32> {
    let (width, height) = skeleton_mask.dimensions();
    let mut counts = Vec::new();

    for y in 0..height {
        let mut runs = 0u32;
        let mut inside = false;
        for x in 0..width {
            let on = skeleton_mask.get_pixel(x, y)[0] > 0;
            if on && !inside {
                runs += 1;
            }
            inside = on;
        }
        if runs > 0 {
            counts.push(runs);
        }
    }

    counts
}

fn mask_bounds(mask: &GrayImage) -> Option<(u32, u32, u32, u32)> {
    let (width, height) = mask.dimensions();
    let mut bounds: Option<(u32, u32, u32, u32)> = None;

    for y in 0..height {
        for x in 0..width {
            if mask.get_pixel(x, y)[0] > 0 {
                bounds = Some(match bounds {
                    None => (x, y, x, y),
                    Some((min_x, min_y, max_x, max_y)) => {
                        (min_x.min(x), min_y.min(y), max_x.max(x), max_y.max(y))
                    }
                });
            }
        }
    }

    bounds
}

/// Widest horizontal extent over all rows of the mask
fn widest_row(mask: &GrayImage) -> u32 {
    let (width, height) = mask.dimensions();
    let mut widest = 0u32;

    for y in 0..height {
        let mut first = None;
        let mut last = 0u32;
        for x in 0..width {
            if mask.get_pixel(x, y)[0] > 0 {
                if first.is_none() {
                    first = Some(x);
                }
                last = x;
            }
        }
        if let Some(first) = first {
            widest = widest.max(last - first + 1);
        }
    }

    widest
}

/// Foreground area below the upper third of the root extent
fn lower_area(mask: &GrayImage, min_y: u32, depth: f64) -> u64 {
    let (width, height) = mask.dimensions();
    let cutoff = min_y as f64 + depth / 3.0;
    let mut area = 0u64;

    for y in 0..height {
        if (y as f64) < cutoff {
            continue;
        }
        for x in 0..width {
            if mask.get_pixel(x, y)[0] > 0 {
                area += 1;
            }
        }
    }

    area
}

/// Pixel count inside the rasterized convex hull of the foreground.
/// The hull covers every mask pixel, so solidity never exceeds one.
fn convex_area(mask: &GrayImage) -> f64 {
    let (width, height) = mask.dimensions();
    let mut points = Vec::new();
    for y in 0..height {
        for x in 0..width {
            if mask.get_pixel(x, y)[0] > 0 {
                points.push(Point::new(x as i32, y as i32));
            }
        }
    }

    if points.len() < 3 {
        return points.len() as f64;
    }

    let hull = convex_hull(&points);
    let mut canvas = GrayImage::new(width, height);
    if hull.len() >= 3 {
        draw_polygon_mut(&mut canvas, &hull, Luma([segmentation::FOREGROUND]));
    } else if hull.len() == 2 {
        // Collinear mask: the hull degenerates to a straight segment
        draw_line_segment_mut(
            &mut canvas,
            (hull[0].x as f32, hull[0].y as f32),
            (hull[1].x as f32, hull[1].y as f32),
            Luma([segmentation::FOREGROUND]),
        );
    } else {
        return points.len() as f64;
    }

    segmentation::foreground_area(&canvas) as f64
}

/// Length-weighted orientation statistics over all segment pixels.
///
/// The local direction at a pixel looks `ANGLE_WINDOW` steps ahead along
/// the chain (backwards near the far end), and its angle is measured
/// from the horizontal in degrees, 0 to 90. Returns the weighted mean
/// angle and the weight fractions in [0,30), [30,60) and [60,90].
fn orientation_statistics(graph: &SkeletonGraph) -> (f64, f64, f64, f64) {
    let mut weighted_sum = 0.0;
    let mut total_weight = 0.0;
    let mut bins = [0.0f64; 3];

    for segment in &graph.segments {
        let pixels = &segment.pixels;
        let n = pixels.len();
        if n < 2 {
            continue;
        }
        let shares = segment.attributed_lengths();
        let tail_start = n - 1 - ANGLE_WINDOW.min(n - 1);

        for i in 0..n {
            let (a, b) = if i + ANGLE_WINDOW <= n - 1 {
                (i, i + ANGLE_WINDOW)
            } else {
                (tail_start, n - 1)
            };
            let dx = (pixels[b].0 as f64 - pixels[a].0 as f64).abs();
            let dy = (pixels[b].1 as f64 - pixels[a].1 as f64).abs();
            let angle = dy.atan2(dx).to_degrees();

            let weight = shares[i];
            weighted_sum += angle * weight;
            total_weight += weight;
            let bin = if angle < 30.0 {
                0
            } else if angle < 60.0 {
                1
            } else {
                2
            };
            bins[bin] += weight;
        }
    }

    (
        weighted_sum / total_weight,
        bins[0] / total_weight,
        bins[1] / total_weight,
        bins[2] / total_weight,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segmentation::{BACKGROUND, FOREGROUND};
    use crate::skeleton;
    use assert_approx_eq::assert_approx_eq;
    use image::Luma;

    fn blank(width: u32, height: u32) -> GrayImage {
        GrayImage::from_pixel(width, height, Luma([BACKGROUND]))
    }

    fn fill_rect(mask: &mut GrayImage, x0: u32, y0: u32, x1: u32, y1: u32, value: u8) {
        for y in y0..y1 {
            for x in x0..x1 {
                mask.put_pixel(x, y, Luma([value]));
            }
        }
    }

    fn asymmetric_y() -> GrayImage {
        let mut mask = blank(60, 60);
        for y in 5..=20 {
            mask.put_pixel(20, y, Luma([FOREGROUND]));
        }
        for t in 1..=10u32 {
            mask.put_pixel(20 - t, 20 + t, Luma([FOREGROUND]));
        }
        for t in 1..=18u32 {
            mask.put_pixel(20 + t, 20 + t, Luma([FOREGROUND]));
        }
        mask
    }

    #[test]
    fn broken_root_counts_and_lengths() {
        let mask = asymmetric_y();
        let skeleton = skeleton::build(&mask, "y").unwrap();
        let features = analyze(&skeleton.graph, &mask, RootType::Broken, "y").unwrap();

        assert_approx_eq!(features.tip_count, 3.0, 1e-12);
        assert_approx_eq!(features.branch_count, 1.0, 1e-12);
        let expected_length = 15.0 + 28.0 * skeleton::SQRT_2;
        assert_approx_eq!(features.total_length, expected_length, 1e-9);
        assert_approx_eq!(
            features.branching_frequency,
            1.0 / expected_length,
            1e-12
        );
        assert_approx_eq!(features.network_area, 44.0, 1e-12);
        assert!(features.perimeter > 0.0);

        // One pixel wide strokes have radius one everywhere
        assert_approx_eq!(features.average_diameter, 2.0, 1e-9);
        assert_approx_eq!(features.median_diameter, 2.0, 1e-9);
        assert_approx_eq!(features.maximum_diameter, 2.0, 1e-9);

        // Whole-root columns stay unmeasured in broken mode
        assert!(features.depth.is_nan());
        assert!(features.convex_area.is_nan());
        assert!(features.average_orientation.is_nan());
    }

    #[test]
    fn whole_root_geometry_of_a_vertical_band() {
        let mut mask = blank(60, 60);
        fill_rect(&mut mask, 18, 5, 21, 45, FOREGROUND);

        let skeleton = skeleton::build(&mask, "band").unwrap();
        let features = analyze(&skeleton.graph, &mask, RootType::Whole, "band").unwrap();

        assert_approx_eq!(features.depth, 40.0, 1e-12);
        assert_approx_eq!(features.max_width, 3.0, 1e-12);
        assert_approx_eq!(features.width_depth_ratio, 3.0 / 40.0, 1e-12);
        assert_approx_eq!(features.median_roots, 1.0, 1e-12);
        assert_approx_eq!(features.max_roots, 1.0, 1e-12);
        assert_approx_eq!(features.network_area, 120.0, 1e-12);
        // The hull of a filled rectangle covers exactly its own pixels
        assert_approx_eq!(features.convex_area, 120.0, 1e-9);
        assert_approx_eq!(features.solidity, 1.0, 1e-9);
        assert_approx_eq!(features.hole_count, 0.0, 1e-12);
        assert!(features.average_hole_size.is_nan());

        // Rows below one third of the extent: y from 19 through 44
        assert_approx_eq!(features.lower_root_area, 78.0, 1e-12);

        assert_approx_eq!(features.average_orientation, 90.0, 1e-6);
        assert_approx_eq!(features.steep_angle_frequency, 1.0, 1e-12);
        assert_approx_eq!(features.shallow_angle_frequency, 0.0, 1e-12);
    }

    #[test]
    fn hull_area_is_at_least_the_network_area() {
        let mask = asymmetric_y();
        let skeleton = skeleton::build(&mask, "y").unwrap();
        let features = analyze(&skeleton.graph, &mask, RootType::Whole, "y").unwrap();

        // Thin strokes span a much larger hull than they fill
        assert!(
            features.convex_area >= features.network_area,
            "hull area {} is smaller than the network area {}",
            features.convex_area,
            features.network_area
        );
        assert!(features.solidity > 0.0);
        assert!(features.solidity <= 1.0);
    }

    #[test]
    fn two_separate_roots_double_the_scanline_counts() {
        let mut mask = blank(40, 40);
        for y in 5..=30 {
            mask.put_pixel(10, y, Luma([FOREGROUND]));
            mask.put_pixel(20, y, Luma([FOREGROUND]));
        }

        let skeleton = skeleton::build(&mask, "pair").unwrap();
        let features = analyze(&skeleton.graph, &mask, RootType::Whole, "pair").unwrap();

        assert_approx_eq!(features.median_roots, 2.0, 1e-12);
        assert_approx_eq!(features.max_roots, 2.0, 1e-12);
        assert_approx_eq!(features.tip_count, 4.0, 1e-12);
    }

    #[test]
    fn donut_reports_its_hole() {
        let mut mask = blank(40, 40);
        fill_rect(&mut mask, 10, 10, 30, 30, FOREGROUND);
        fill_rect(&mut mask, 15, 15, 25, 25, BACKGROUND);

        let skeleton = skeleton::build(&mask, "donut").unwrap();
        let features = analyze(&skeleton.graph, &mask, RootType::Whole, "donut").unwrap();

        assert_approx_eq!(features.hole_count, 1.0, 1e-12);
        assert_approx_eq!(features.average_hole_size, 100.0, 1e-12);
        assert_approx_eq!(features.tip_count, 0.0, 1e-12);
        assert!(features.solidity < 1.0);
    }

    #[test]
    fn empty_graph_is_rejected() {
        let graph = SkeletonGraph {
            width: 10,
            height: 10,
            nodes: Vec::new(),
            segments: Vec::new(),
        };
        let mask = blank(10, 10);
        let result = analyze(&graph, &mask, RootType::Broken, "none");
        assert!(matches!(result, Err(RootMorphError::EmptyTopology(_))));
    }
}
