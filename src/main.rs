// src/main.rs - Command line batch interface for RootMorphR

use std::path::Path;
use std::time::Instant;

use clap::{Parser, ValueEnum};
use rayon::prelude::*;

use root_morph_rust_lib::config::{Config, RootType, UnitMode};
use root_morph_rust_lib::errors::{Result, RootMorphError};
use root_morph_rust_lib::image_io::{
    collect_image_files, load_image, save_gray_image, save_rgb_image,
};
use root_morph_rust_lib::output::{
    resolve_csv_path, resolve_output_dir, write_features_csv, FeatureRow,
};
use root_morph_rust_lib::pipeline::{process_image, CancelToken, ImageAnalysis};
use root_morph_rust_lib::roi::{load_regions, Region};

/// Command-line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about = "RootMorphR - Plant root phenotyping from scanned images")]
struct Args {
    /// Path to an image file or a directory containing images
    #[clap(required_unless_present = "config")]
    input: Option<String>,

    /// Path to a TOML configuration file; command line flags override it
    #[clap(short, long)]
    config: Option<String>,

    /// Do not append to the output file if it exists, overwrite it
    #[clap(long = "noappend", alias = "na")]
    noappend: bool,

    /// Output directory for processed images (default: same directory as input)
    #[clap(long = "output_path", alias = "op")]
    output_path: Option<String>,

    /// Output CSV file, created in the output directory unless absolute
    #[clap(short, long = "output")]
    output: Option<String>,

    /// CSV file with region-of-interest rectangles (name,x,y,width,height)
    #[clap(long = "roipath")]
    roipath: Option<String>,

    /// Process directories recursively
    #[clap(short, long)]
    recursive: bool,

    /// Enable verbose output
    #[clap(short, long)]
    verbose: bool,

    /// Process images one at a time instead of in parallel
    #[clap(long)]
    sequential: bool,

    /// Root type to measure
    #[clap(long = "roottype", alias = "rt", value_enum)]
    roottype: Option<RootTypeArg>,

    /// Segmentation threshold 0-255
    #[clap(short, long)]
    threshold: Option<u32>,

    /// Invert image colors before processing. The background should be
    /// brighter than the roots by default.
    #[clap(short, long)]
    invert: bool,

    /// Keep only the largest component
    #[clap(long = "keeplargest", alias = "kl")]
    keeplargest: bool,

    /// Filter background noise components
    #[clap(long = "bgnoise")]
    bgnoise: bool,

    /// Filter foreground noise components
    #[clap(long = "fgnoise")]
    fgnoise: bool,

    /// Max background component size as a fraction of image area
    #[clap(long = "bgsize")]
    bgsize: Option<f64>,

    /// Max foreground component size as a fraction of image area
    #[clap(long = "fgsize")]
    fgsize: Option<f64>,

    /// Enable contour smoothing
    #[clap(short = 's', long = "smooth")]
    smooth: bool,

    /// Contour smoothing threshold in pixels
    #[clap(long = "smooththreshold", alias = "st")]
    smooththreshold: Option<f64>,

    /// Enable pixel to physical unit (mm) conversion
    #[clap(long = "convert")]
    convert: bool,

    /// Conversion factor in DPI
    #[clap(long = "factordpi")]
    factordpi: Option<f64>,

    /// Conversion factor in pixels per mm; --factordpi is ignored if set
    #[clap(long = "factorpixels")]
    factorpixels: Option<f64>,

    /// Enable root pruning
    #[clap(long = "prune")]
    prune: bool,

    /// Root pruning threshold in pixels, applied when --prune is enabled
    #[clap(long = "prunethreshold", alias = "pt")]
    prunethreshold: Option<u32>,

    /// Comma-separated ascending diameter ranges for statistical features.
    /// Treated as mm if --convert is specified, pixels otherwise.
    #[clap(long = "dranges", value_delimiter = ',', num_args = 0..)]
    dranges: Option<Vec<f64>>,

    /// Save segmented images
    #[clap(long = "segment")]
    segment: bool,

    /// Save processed feature images
    #[clap(long = "feature")]
    feature: bool,

    /// Suffix for saved segmented images
    #[clap(long = "ssuffix")]
    ssuffix: Option<String>,

    /// Suffix for saved processed images
    #[clap(long = "fsuffix")]
    fsuffix: Option<String>,

    /// Show convex hull in processed images (whole roots only)
    #[clap(long = "convexhull", alias = "ch")]
    convexhull: bool,

    /// Show holes in processed images (whole roots only)
    #[clap(long = "holes", alias = "ho")]
    holes: bool,

    /// Show distance map in processed images
    #[clap(long = "distancemap", alias = "dm")]
    distancemap: bool,

    /// Show medial axis in processed images
    #[clap(long = "medialaxis", alias = "ma")]
    medialaxis: bool,

    /// Medial axis width
    #[clap(long = "medialaxiswidth", alias = "mw")]
    medialaxiswidth: Option<u32>,

    /// Color the medial axis by topological depth instead of by the
    /// diameter ranges from --dranges
    #[clap(long = "topology", alias = "to")]
    topology: bool,

    /// Show contours in processed images (whole roots only)
    #[clap(long = "contours", alias = "co")]
    contours: bool,

    /// Contour width
    #[clap(long = "contourwidth", alias = "cw")]
    contourwidth: Option<u32>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RootTypeArg {
    Whole,
    Broken,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    apply_overrides(&mut config, &args);
    config.validate()?;

    if !config.output_path.is_empty() && !Path::new(&config.output_path).exists() {
        return Err(RootMorphError::Config(format!(
            "Output path {} does not exist",
            config.output_path
        )));
    }

    let regions = load_configured_regions(&config)?;

    let files = collect_image_files(&config.input_path, config.recursive)?;
    if files.is_empty() {
        eprintln!("No supported image files found in {}", config.input_path);
        std::process::exit(1);
    }

    if config.verbose {
        print_configuration(&config, files.len());
    }

    let cancel = CancelToken::new();
    let started = Instant::now();
    let total = files.len();

    let results: Vec<Option<Vec<FeatureRow>>> = if config.use_parallel && total > 1 {
        files
            .par_iter()
            .map(|path| {
                if config.verbose {
                    println!("Processing: {}", path.display());
                }
                run_one(path, &regions, &config, &cancel)
            })
            .collect()
    } else {
        files
            .iter()
            .enumerate()
            .map(|(index, path)| {
                if config.verbose {
                    print_progress(index, total, started.elapsed().as_secs_f64(), path);
                }
                run_one(path, &regions, &config, &cancel)
            })
            .collect()
    };

    let processed = count_processed(&results);
    let rows: Vec<FeatureRow> = results.into_iter().flatten().flatten().collect();
    if rows.is_empty() {
        eprintln!("No images were successfully processed.");
        std::process::exit(1);
    }

    let csv_path = resolve_csv_path(&config);
    write_features_csv(&csv_path, &rows, &config)?;

    println!("Successfully processed {} image(s).", processed);

    Ok(())
}

/// Overlay command line flags onto the configuration. Boolean flags only
/// ever enable features, matching how the config file enables them.
fn apply_overrides(config: &mut Config, args: &Args) {
    if let Some(input) = &args.input {
        config.input_path = input.clone();
    }
    if let Some(path) = &args.output_path {
        config.output_path = path.clone();
    }
    if let Some(file) = &args.output {
        config.output_file = file.clone();
    }
    if let Some(path) = &args.roipath {
        config.roi_path = Some(path.clone());
    }
    if args.noappend {
        config.no_append = true;
    }
    if args.recursive {
        config.recursive = true;
    }
    if args.verbose {
        config.verbose = true;
    }
    if args.sequential {
        config.use_parallel = false;
    }

    if let Some(root_type) = args.roottype {
        config.root_type = match root_type {
            RootTypeArg::Whole => RootType::Whole,
            RootTypeArg::Broken => RootType::Broken,
        };
    }
    if let Some(threshold) = args.threshold {
        config.threshold = threshold;
    }
    if args.invert {
        config.invert = true;
    }

    if args.keeplargest {
        config.keep_largest = true;
    }
    if args.bgnoise {
        config.filter_bg_noise = true;
    }
    if args.fgnoise {
        config.filter_fg_noise = true;
    }
    if let Some(size) = args.bgsize {
        config.max_bg_size = size;
    }
    if let Some(size) = args.fgsize {
        config.max_fg_size = size;
    }

    if args.smooth {
        config.enable_smoothing = true;
    }
    if let Some(threshold) = args.smooththreshold {
        config.smooth_threshold = threshold;
    }

    if args.prune {
        config.enable_pruning = true;
    }
    if let Some(threshold) = args.prunethreshold {
        config.pruning_threshold = threshold;
    }
    if let Some(ranges) = &args.dranges {
        config.diameter_ranges = ranges.clone();
    }

    if args.segment {
        config.save_segmented = true;
    }
    if args.feature {
        config.save_processed = true;
    }
    if let Some(suffix) = &args.ssuffix {
        config.segmented_suffix = suffix.clone();
    }
    if let Some(suffix) = &args.fsuffix {
        config.processed_suffix = suffix.clone();
    }

    if args.convexhull {
        config.show_convex_hull = true;
    }
    if args.holes {
        config.show_holes = true;
    }
    if args.distancemap {
        config.show_distance_map = true;
    }
    if args.medialaxis {
        config.show_medial_axis = true;
    }
    if let Some(width) = args.medialaxiswidth {
        config.medial_axis_width = width;
    }
    if args.topology {
        config.color_axis_by_diameter = false;
    }
    if args.contours {
        config.show_contours = true;
    }
    if let Some(width) = args.contourwidth {
        config.contour_width = width;
    }

    if config.root_type == RootType::Broken && (args.convexhull || args.holes || args.contours) {
        eprintln!("Warning: Convex hull, holes, and contours options are ignored for broken roots.");
        config.show_convex_hull = false;
        config.show_holes = false;
        config.show_contours = false;
    }

    if args.convert {
        config.convert_units = true;
    }
    if config.convert_units {
        if let Some(factor) = args.factorpixels {
            config.conversion_factor = factor;
            config.unit_mode = UnitMode::PixelsPerMm;
            if args.factordpi.is_some() {
                eprintln!("Warning: Both --factorpixels and --factordpi are set. Using --factorpixels.");
            }
        } else if let Some(factor) = args.factordpi {
            config.conversion_factor = factor;
            config.unit_mode = UnitMode::Dpi;
        }
    } else if args.factordpi.is_some() || args.factorpixels.is_some() {
        eprintln!("Warning: Conversion factor provided but --convert is not set. Ignoring conversion factor.");
    }

    if args.fgsize.is_some() && !config.filter_fg_noise {
        eprintln!("Warning: --fgsize is set but --fgnoise is not enabled. Ignoring --fgsize.");
    }
    if args.bgsize.is_some() && !config.filter_bg_noise {
        eprintln!("Warning: --bgsize is set but --bgnoise is not enabled. Ignoring --bgsize.");
    }
    if args.smooththreshold.is_some() && !config.enable_smoothing {
        eprintln!("Warning: --smooththreshold is set but --smooth is not enabled. Ignoring --smooththreshold.");
    }
    if args.prunethreshold.is_some() && !config.enable_pruning {
        eprintln!("Warning: --prunethreshold is set but --prune is not enabled. Ignoring --prunethreshold.");
    }
    if args.ssuffix.is_some() && !config.save_segmented {
        eprintln!("Warning: --ssuffix is set but --segment is not enabled. Ignoring --ssuffix.");
    }
    if args.fsuffix.is_some() && !config.save_processed {
        eprintln!("Warning: --fsuffix is set but --feature is not enabled. Ignoring --fsuffix.");
    }
}

/// Load regions of interest named by the configuration. A missing ROI
/// file downgrades to a warning and the batch runs on full images.
fn load_configured_regions(config: &Config) -> Result<Vec<Region>> {
    match &config.roi_path {
        Some(path) if !Path::new(path).exists() => {
            eprintln!("Warning: ROI path {} does not exist.", path);
            eprintln!("Continuing without ROI annotations.");
            Ok(Vec::new())
        }
        Some(path) => load_regions(path),
        None => Ok(Vec::new()),
    }
}

fn print_configuration(config: &Config, file_count: usize) {
    println!("RootMorphR Command Line Interface");
    println!("Found {} image file(s) to process.", file_count);
    println!("Configuration:");
    println!(
        "  Root type: {}",
        match config.root_type {
            RootType::Whole => "whole root",
            RootType::Broken => "broken roots",
        }
    );
    println!("  Threshold: {}", config.threshold);
    println!("  Invert image: {}", if config.invert { "yes" } else { "no" });
    println!(
        "  Pixel conversion: {}",
        if config.convert_units { "enabled" } else { "disabled" }
    );
    println!("  Input path: {}", config.input_path);
    println!("  Output file: {}", resolve_csv_path(config).display());
    println!("  Output path: {}", resolve_output_dir(config).display());
    if config.convert_units {
        println!("  Conversion factor: {}", config.conversion_factor);
    }
}

/// Process one file, reporting its error on stderr instead of aborting
/// the batch
fn run_one(
    path: &Path,
    regions: &[Region],
    config: &Config,
    cancel: &CancelToken,
) -> Option<Vec<FeatureRow>> {
    match analyze_file(path, regions, config, cancel) {
        Ok(rows) => Some(rows),
        Err(e) => {
            eprintln!("Error processing {}: {}", path.display(), e);
            None
        }
    }
}

fn analyze_file(
    path: &Path,
    regions: &[Region],
    config: &Config,
    cancel: &CancelToken,
) -> Result<Vec<FeatureRow>> {
    let input = load_image(path)?;
    let analysis = process_image(&input, regions, config, cancel)?;

    let ImageAnalysis {
        filename,
        regions: region_results,
        segmented,
        processed,
    } = analysis;

    let output_dir = resolve_output_dir(config);

    if let Some(image) = &segmented {
        let savefile = format!("{}{}.png", input.filename, config.segmented_suffix);
        save_gray_image(image, output_dir.join(&savefile))?;
        if config.verbose {
            println!("  Segmented image saved as {}", savefile);
        }
    }

    if let Some(image) = &processed {
        let savefile = format!("{}{}.png", input.filename, config.processed_suffix);
        save_rgb_image(image, output_dir.join(&savefile))?;
        if config.verbose {
            println!("  Processed image saved as {}", savefile);
        }
    }

    Ok(region_results
        .into_iter()
        .map(|r| FeatureRow {
            filename: filename.clone(),
            region: r.region,
            features: r.features,
        })
        .collect())
}

/// Number of images that produced rows. An image measured over several
/// regions still counts once.
fn count_processed(results: &[Option<Vec<FeatureRow>>]) -> usize {
    results.iter().filter(|r| r.is_some()).count()
}

fn print_progress(index: usize, total: usize, elapsed: f64, path: &Path) {
    let (eh, em, es) = split_hms(elapsed);
    let (rh, rm, rs) = split_hms(estimated_remaining(index, total, elapsed));
    let name = path.file_name().and_then(|s| s.to_str()).unwrap_or("");
    println!(
        "Processing ({} of {}) - [elapsed: {}h {}m {}s] - [remaining: {}h {}m {}s] - {}",
        index + 1,
        total,
        eh,
        em,
        es,
        rh,
        rm,
        rs,
        name
    );
}

/// Average seconds per finished image times the images left. Before the
/// first image completes there is nothing to average, so guess two
/// seconds per image.
fn estimated_remaining(index: usize, total: usize, elapsed: f64) -> f64 {
    if index > 0 {
        let average = elapsed / (index as f64 + 1.0);
        average * (total - index - 1) as f64
    } else {
        (total * 2) as f64
    }
}

fn split_hms(seconds: f64) -> (u64, u64, u64) {
    let total = seconds as u64;
    (total / 3600, (total % 3600) / 60, total % 60)
}
