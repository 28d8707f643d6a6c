// src/lib.rs - Library interface for RootMorphR

pub mod buckets;
pub mod components;
pub mod config;
pub mod errors;
pub mod features;
pub mod image_io;
pub mod output;
pub mod overlay;
pub mod pipeline;
pub mod pruning;
pub mod roi;
pub mod segmentation;
pub mod skeleton;
pub mod topology;
pub mod units;

// Re-export commonly used types and functions
pub use errors::{Result, RootMorphError};
pub use config::{Config, RootType, UnitMode};
pub use pipeline::{analyze_region, process_image, CancelToken, ImageAnalysis, RegionAnalysis};
pub use image_io::{collect_image_files, load_image, InputImage};
pub use features::{csv_header, FeatureVector};
pub use output::{resolve_csv_path, write_features_csv, FeatureRow};
pub use roi::{load_regions, Region};

// Re-export the measurement stages for callers driving them directly
pub use segmentation::segment;
pub use components::{filter_components, FilterStats};
pub use skeleton::{DistanceField, Skeleton, SkeletonGraph};
pub use pruning::prune;
pub use buckets::{bucket_by_diameter, length_by_diameter, DiameterBuckets};
pub use units::apply_factor;
