// src/config.rs - Analysis configuration with TOML round-trip support

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::errors::{Result, RootMorphError};

/// Configuration for RootMorphR
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default = "default_input_path")]
    pub input_path: String,

    /// Directory for processed images and the feature CSV.
    /// Empty means: same directory as the input.
    #[serde(default = "default_output_path")]
    pub output_path: String,

    #[serde(default = "default_output_file")]
    pub output_file: String,

    /// Overwrite the feature CSV instead of appending to it
    #[serde(default = "default_false")]
    pub no_append: bool,

    #[serde(default = "default_false")]
    pub recursive: bool,

    #[serde(default = "default_false")]
    pub verbose: bool,

    #[serde(default = "default_parallel")]
    pub use_parallel: bool,

    /// CSV file with region-of-interest rectangles applied to every image
    #[serde(default = "default_roi_path")]
    pub roi_path: Option<String>,

    // Root analysis options
    #[serde(default = "default_root_type")]
    pub root_type: RootType,

    #[serde(default = "default_threshold")]
    pub threshold: u32,

    #[serde(default = "default_false")]
    pub invert: bool,

    // Contour smoothing options
    #[serde(default = "default_false")]
    pub enable_smoothing: bool,

    #[serde(default = "default_smooth_threshold")]
    pub smooth_threshold: f64,

    // Component filtering options
    #[serde(default = "default_true")]
    pub keep_largest: bool,

    #[serde(default = "default_false")]
    pub filter_bg_noise: bool,

    #[serde(default = "default_false")]
    pub filter_fg_noise: bool,

    #[serde(default = "default_max_component_size")]
    pub max_bg_size: f64,

    #[serde(default = "default_max_component_size")]
    pub max_fg_size: f64,

    // Root pruning options
    #[serde(default = "default_false")]
    pub enable_pruning: bool,

    #[serde(default = "default_pruning_threshold")]
    pub pruning_threshold: u32,

    // Diameter ranges for statistical features, in output units
    #[serde(default = "default_diameter_ranges")]
    pub diameter_ranges: Vec<f64>,

    // Unit conversion options
    #[serde(default = "default_false")]
    pub convert_units: bool,

    #[serde(default = "default_unit_mode")]
    pub unit_mode: UnitMode,

    #[serde(default = "default_conversion_factor")]
    pub conversion_factor: f64,

    // Image output options
    #[serde(default = "default_false")]
    pub save_segmented: bool,

    #[serde(default = "default_false")]
    pub save_processed: bool,

    #[serde(default = "default_segmented_suffix")]
    pub segmented_suffix: String,

    #[serde(default = "default_processed_suffix")]
    pub processed_suffix: String,

    // Processed image options
    #[serde(default = "default_true")]
    pub show_convex_hull: bool,

    #[serde(default = "default_true")]
    pub show_holes: bool,

    #[serde(default = "default_false")]
    pub show_distance_map: bool,

    #[serde(default = "default_true")]
    pub show_medial_axis: bool,

    #[serde(default = "default_medial_axis_width")]
    pub medial_axis_width: u32,

    /// Color the medial axis by diameter range; when false, color by
    /// topological depth instead
    #[serde(default = "default_true")]
    pub color_axis_by_diameter: bool,

    #[serde(default = "default_true")]
    pub show_contours: bool,

    #[serde(default = "default_contour_width")]
    pub contour_width: u32,
}

/// Root type enum: measurement schema for the analyzed root system
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RootType {
    /// Intact, connected root crown
    Whole,
    /// Washed, disconnected root fragments
    Broken,
}

/// Unit conversion mode for the conversion factor
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UnitMode {
    /// Factor is dots per inch of the scanner
    Dpi,
    /// Factor is pixels per millimeter
    PixelsPerMm,
}

fn default_input_path() -> String {
    "./input".to_string()
}

fn default_output_path() -> String {
    String::new()
}

fn default_output_file() -> String {
    "features.csv".to_string()
}

fn default_roi_path() -> Option<String> {
    None
}

fn default_false() -> bool {
    false
}

fn default_true() -> bool {
    true
}

fn default_parallel() -> bool {
    true
}

fn default_root_type() -> RootType {
    RootType::Broken
}

fn default_threshold() -> u32 {
    200
}

fn default_smooth_threshold() -> f64 {
    2.0
}

fn default_max_component_size() -> f64 {
    1.0
}

fn default_pruning_threshold() -> u32 {
    1
}

fn default_diameter_ranges() -> Vec<f64> {
    vec![2.0, 5.0]
}

fn default_unit_mode() -> UnitMode {
    UnitMode::Dpi
}

fn default_conversion_factor() -> f64 {
    1.0
}

fn default_segmented_suffix() -> String {
    "_seg".to_string()
}

fn default_processed_suffix() -> String {
    "_features".to_string()
}

fn default_medial_axis_width() -> u32 {
    3
}

fn default_contour_width() -> u32 {
    1
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            RootMorphError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| {
            RootMorphError::Config(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Ok(config)
    }

    /// Create default configuration
    pub fn default() -> Self {
        Self {
            input_path: default_input_path(),
            output_path: String::new(),
            output_file: default_output_file(),
            no_append: false,
            recursive: false,
            verbose: false,
            use_parallel: true,
            roi_path: None,
            root_type: RootType::Broken,
            threshold: 200,
            invert: false,
            enable_smoothing: false,
            smooth_threshold: 2.0,
            keep_largest: true,
            filter_bg_noise: false,
            filter_fg_noise: false,
            max_bg_size: 1.0,
            max_fg_size: 1.0,
            enable_pruning: false,
            pruning_threshold: 1,
            diameter_ranges: vec![2.0, 5.0],
            convert_units: false,
            unit_mode: UnitMode::Dpi,
            conversion_factor: 1.0,
            save_segmented: false,
            save_processed: false,
            segmented_suffix: "_seg".to_string(),
            processed_suffix: "_features".to_string(),
            show_convex_hull: true,
            show_holes: true,
            show_distance_map: false,
            show_medial_axis: true,
            medial_axis_width: 3,
            color_axis_by_diameter: true,
            show_contours: true,
            contour_width: 1,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.threshold > 255 {
            return Err(RootMorphError::Config(
                "threshold must be between 0 and 255".to_string(),
            ));
        }

        if self.enable_smoothing && self.smooth_threshold <= 0.0 {
            return Err(RootMorphError::Config(
                "smooth_threshold must be > 0.0".to_string(),
            ));
        }

        if self.max_bg_size < 0.0 {
            return Err(RootMorphError::Config(
                "max_bg_size must be >= 0.0".to_string(),
            ));
        }

        if self.max_fg_size < 0.0 {
            return Err(RootMorphError::Config(
                "max_fg_size must be >= 0.0".to_string(),
            ));
        }

        for (k, value) in self.diameter_ranges.iter().enumerate() {
            if *value <= 0.0 {
                return Err(RootMorphError::Config(format!(
                    "diameter_ranges must contain positive values, got {}",
                    value
                )));
            }
            if k > 0 && *value < self.diameter_ranges[k - 1] {
                return Err(RootMorphError::Config(
                    "diameter_ranges must be in ascending order".to_string(),
                ));
            }
        }

        if self.convert_units && self.conversion_factor <= 0.0 {
            return Err(RootMorphError::Config(
                "conversion_factor must be > 0.0 when convert_units is enabled".to_string(),
            ));
        }

        if self.medial_axis_width == 0 {
            return Err(RootMorphError::Config(
                "medial_axis_width must be > 0".to_string(),
            ));
        }

        if self.contour_width == 0 {
            return Err(RootMorphError::Config(
                "contour_width must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Millimeters per pixel, or 1.0 when unit conversion is disabled
    pub fn unit_factor(&self) -> f64 {
        if !self.convert_units {
            return 1.0;
        }

        match self.unit_mode {
            UnitMode::Dpi => 25.4 / self.conversion_factor,
            UnitMode::PixelsPerMm => 1.0 / self.conversion_factor,
        }
    }

    /// Diameter range thresholds converted to the pixel domain.
    /// The configured values are interpreted in the output unit, so they
    /// are divided by the unit factor before bucketing.
    pub fn ranges_in_pixels(&self) -> Vec<f64> {
        let factor = self.unit_factor();
        self.diameter_ranges.iter().map(|v| v / factor).collect()
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| RootMorphError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, content).map_err(RootMorphError::Io)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn threshold_out_of_range_is_rejected() {
        let mut config = Config::default();
        config.threshold = 300;
        assert!(config.validate().is_err());
    }

    #[test]
    fn descending_diameter_ranges_are_rejected() {
        let mut config = Config::default();
        config.diameter_ranges = vec![5.0, 2.0];
        assert!(config.validate().is_err());
    }

    #[test]
    fn non_positive_diameter_range_is_rejected() {
        let mut config = Config::default();
        config.diameter_ranges = vec![0.0, 2.0];
        assert!(config.validate().is_err());
    }

    #[test]
    fn unit_factor_dpi() {
        let mut config = Config::default();
        config.convert_units = true;
        config.unit_mode = UnitMode::Dpi;
        config.conversion_factor = 254.0;
        assert_approx_eq!(config.unit_factor(), 0.1, 1e-12);
    }

    #[test]
    fn unit_factor_pixels_per_mm() {
        let mut config = Config::default();
        config.convert_units = true;
        config.unit_mode = UnitMode::PixelsPerMm;
        config.conversion_factor = 10.0;
        assert_approx_eq!(config.unit_factor(), 0.1, 1e-12);
    }

    #[test]
    fn unit_factor_disabled_is_identity() {
        let mut config = Config::default();
        config.convert_units = false;
        config.conversion_factor = 300.0;
        assert_approx_eq!(config.unit_factor(), 1.0, 1e-12);
    }

    #[test]
    fn ranges_in_pixels_divides_by_factor() {
        let mut config = Config::default();
        config.convert_units = true;
        config.unit_mode = UnitMode::PixelsPerMm;
        config.conversion_factor = 2.0;
        config.diameter_ranges = vec![1.0, 3.0];
        let ranges = config.ranges_in_pixels();
        assert_approx_eq!(ranges[0], 2.0, 1e-12);
        assert_approx_eq!(ranges[1], 6.0, 1e-12);
    }

    #[test]
    fn config_toml_round_trip() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.threshold, config.threshold);
        assert_eq!(parsed.root_type, config.root_type);
        assert_eq!(parsed.diameter_ranges, config.diameter_ranges);
    }
}
