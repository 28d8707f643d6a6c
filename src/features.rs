// src/features.rs - Feature vector, CSV schema and numeric formatting

use crate::config::RootType;

/// Unit suffixes appended to dimensioned column names
#[derive(Debug, Clone, Copy)]
pub struct UnitSuffixes {
    pub length: &'static str,
    pub area: &'static str,
    pub volume: &'static str,
    pub per_length: &'static str,
}

impl UnitSuffixes {
    pub fn for_units(converted: bool) -> Self {
        if converted {
            Self {
                length: ".mm",
                area: ".mm2",
                volume: ".mm3",
                per_length: ".per.mm",
            }
        } else {
            Self {
                length: ".px",
                area: ".px2",
                volume: ".px3",
                per_length: ".per.px",
            }
        }
    }
}

/// All scalar features of one analyzed image or region, plus the four
/// per-diameter-range vectors. Whole-root only fields stay NaN when the
/// broken-root variant runs; serialization picks the columns that apply.
#[derive(Debug, Clone)]
pub struct FeatureVector {
    pub median_roots: f64,
    pub max_roots: f64,
    pub tip_count: f64,
    pub branch_count: f64,
    pub total_length: f64,
    pub branching_frequency: f64,
    pub depth: f64,
    pub max_width: f64,
    pub width_depth_ratio: f64,
    pub network_area: f64,
    pub convex_area: f64,
    pub solidity: f64,
    pub lower_root_area: f64,
    pub average_diameter: f64,
    pub median_diameter: f64,
    pub maximum_diameter: f64,
    pub perimeter: f64,
    pub volume: f64,
    pub surface_area: f64,
    pub hole_count: f64,
    pub average_hole_size: f64,
    pub computation_time: f64,
    pub average_orientation: f64,
    pub shallow_angle_frequency: f64,
    pub medium_angle_frequency: f64,
    pub steep_angle_frequency: f64,
    pub bucket_lengths: Vec<f64>,
    pub bucket_projected_areas: Vec<f64>,
    pub bucket_surface_areas: Vec<f64>,
    pub bucket_volumes: Vec<f64>,
}

impl FeatureVector {
    /// Row used when an image yields nothing to measure: every value NA
    pub fn unmeasured(bucket_count: usize) -> Self {
        Self {
            median_roots: f64::NAN,
            max_roots: f64::NAN,
            tip_count: f64::NAN,
            branch_count: f64::NAN,
            total_length: f64::NAN,
            branching_frequency: f64::NAN,
            depth: f64::NAN,
            max_width: f64::NAN,
            width_depth_ratio: f64::NAN,
            network_area: f64::NAN,
            convex_area: f64::NAN,
            solidity: f64::NAN,
            lower_root_area: f64::NAN,
            average_diameter: f64::NAN,
            median_diameter: f64::NAN,
            maximum_diameter: f64::NAN,
            perimeter: f64::NAN,
            volume: f64::NAN,
            surface_area: f64::NAN,
            hole_count: f64::NAN,
            average_hole_size: f64::NAN,
            computation_time: f64::NAN,
            average_orientation: f64::NAN,
            shallow_angle_frequency: f64::NAN,
            medium_angle_frequency: f64::NAN,
            steep_angle_frequency: f64::NAN,
            bucket_lengths: vec![f64::NAN; bucket_count],
            bucket_projected_areas: vec![f64::NAN; bucket_count],
            bucket_surface_areas: vec![f64::NAN; bucket_count],
            bucket_volumes: vec![f64::NAN; bucket_count],
        }
    }

    /// Feature values in column order for the given analysis variant
    pub fn values(&self, root_type: RootType) -> Vec<f64> {
        let mut out = match root_type {
            RootType::Whole => vec![
                self.median_roots,
                self.max_roots,
                self.tip_count,
                self.total_length,
                self.depth,
                self.max_width,
                self.width_depth_ratio,
                self.network_area,
                self.convex_area,
                self.solidity,
                self.lower_root_area,
                self.average_diameter,
                self.median_diameter,
                self.maximum_diameter,
                self.perimeter,
                self.volume,
                self.surface_area,
                self.hole_count,
                self.average_hole_size,
                self.computation_time,
                self.average_orientation,
                self.shallow_angle_frequency,
                self.medium_angle_frequency,
                self.steep_angle_frequency,
            ],
            RootType::Broken => vec![
                self.tip_count,
                self.branch_count,
                self.total_length,
                self.branching_frequency,
                self.network_area,
                self.average_diameter,
                self.median_diameter,
                self.maximum_diameter,
                self.perimeter,
                self.volume,
                self.surface_area,
                self.computation_time,
            ],
        };
        out.extend_from_slice(&self.bucket_lengths);
        out.extend_from_slice(&self.bucket_projected_areas);
        out.extend_from_slice(&self.bucket_surface_areas);
        out.extend_from_slice(&self.bucket_volumes);
        out
    }

    /// CSV record for this row: file name, region name, then every
    /// feature formatted for output
    pub fn csv_record(&self, filename: &str, roi: &str, root_type: RootType) -> Vec<String> {
        let mut record = vec![filename.to_string(), roi.to_string()];
        record.extend(self.values(root_type).iter().map(|&v| format_feature(v)));
        record
    }
}

/// CSV header for the given analysis variant and unit system.
/// `bucket_count` is the number of diameter ranges plus one.
pub fn csv_header(root_type: RootType, converted: bool, bucket_count: usize) -> Vec<String> {
    let units = UnitSuffixes::for_units(converted);
    let mut header: Vec<String> = vec!["File.Name".into(), "Region.of.Interest".into()];

    match root_type {
        RootType::Whole => {
            header.push("Median.Number.of.Roots".into());
            header.push("Maximum.Number.of.Roots".into());
            header.push("Number.of.Root.Tips".into());
            header.push(format!("Total.Root.Length{}", units.length));
            header.push(format!("Depth{}", units.length));
            header.push(format!("Maximum.Width{}", units.length));
            header.push("Width-to-Depth.Ratio".into());
            header.push(format!("Network.Area{}", units.area));
            header.push(format!("Convex.Area{}", units.area));
            header.push("Solidity".into());
            header.push(format!("Lower.Root.Area{}", units.area));
            header.push(format!("Average.Diameter{}", units.length));
            header.push(format!("Median.Diameter{}", units.length));
            header.push(format!("Maximum.Diameter{}", units.length));
            header.push(format!("Perimeter{}", units.length));
            header.push(format!("Volume{}", units.volume));
            header.push(format!("Surface.Area{}", units.area));
            header.push("Holes".into());
            header.push(format!("Average.Hole.Size{}", units.area));
            header.push("Computation.Time.s".into());
            header.push("Average.Root.Orientation.deg".into());
            header.push("Shallow.Angle.Frequency".into());
            header.push("Medium.Angle.Frequency".into());
            header.push("Steep.Angle.Frequency".into());
        }
        RootType::Broken => {
            header.push("Number.of.Root.Tips".into());
            header.push("Number.of.Branch.Points".into());
            header.push(format!("Total.Root.Length{}", units.length));
            header.push(format!("Branching.frequency{}", units.per_length));
            header.push(format!("Network.Area{}", units.area));
            header.push(format!("Average.Diameter{}", units.length));
            header.push(format!("Median.Diameter{}", units.length));
            header.push(format!("Maximum.Diameter{}", units.length));
            header.push(format!("Perimeter{}", units.length));
            header.push(format!("Volume{}", units.volume));
            header.push(format!("Surface.Area{}", units.area));
            header.push("Computation.Time.s".into());
        }
    }

    for k in 1..=bucket_count {
        header.push(format!("Root.Length.Diameter.Range.{}{}", k, units.length));
    }
    for k in 1..=bucket_count {
        header.push(format!("Projected.Area.Diameter.Range.{}{}", k, units.area));
    }
    for k in 1..=bucket_count {
        header.push(format!("Surface.Area.Diameter.Range.{}{}", k, units.area));
    }
    for k in 1..=bucket_count {
        header.push(format!("Volume.Diameter.Range.{}{}", k, units.volume));
    }

    header
}

/// Format one feature value the way the CSV expects it.
///
/// Finite non-zero values print with `ceil(log10(|v|)) + 6` significant
/// digits, at least one, choosing fixed or scientific notation the way
/// C's %g does and stripping trailing zeros. Exact zero prints as `0`,
/// NaN and infinities print as `NA`.
pub fn format_feature(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    if !value.is_finite() {
        return "NA".to_string();
    }
    let precision = (value.abs().log10().ceil() as i32 + 6).max(1) as usize;
    format_significant(value, precision)
}

fn format_significant(value: f64, precision: usize) -> String {
    // Round to the target significant digits in scientific form first;
    // the exponent after rounding decides the notation
    let rounded = format!("{:.*e}", precision - 1, value);
    let (mantissa, exponent) = match rounded.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (rounded.as_str(), 0),
    };

    if exponent < -4 || exponent >= precision as i32 {
        let mantissa = strip_trailing_zeros(mantissa);
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", mantissa, sign, exponent.abs())
    } else {
        let decimals = (precision as i32 - 1 - exponent).max(0) as usize;
        let fixed = format!("{:.*}", decimals, value);
        strip_trailing_zeros(&fixed).to_string()
    }
}

fn strip_trailing_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}
