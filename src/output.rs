// src/output.rs - Feature CSV writing and output path resolution

use std::fs;
use std::path::{Path, PathBuf};

use csv::Writer;

use crate::config::Config;
use crate::errors::{Result, RootMorphError};
use crate::features::{csv_header, FeatureVector};

/// One measured CSV row: image file name, region name and the features
#[derive(Debug, Clone)]
pub struct FeatureRow {
    pub filename: String,
    pub region: String,
    pub features: FeatureVector,
}

/// Directory that receives the feature CSV and any saved images.
/// An empty configured output path falls back to the input location.
pub fn resolve_output_dir(config: &Config) -> PathBuf {
    if !config.output_path.is_empty() {
        return PathBuf::from(&config.output_path);
    }

    let input = Path::new(&config.input_path);
    if input.is_dir() {
        input.to_path_buf()
    } else {
        input
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Full path of the feature CSV. An absolute output file name is used
/// as given; a relative one lands in the output directory.
pub fn resolve_csv_path(config: &Config) -> PathBuf {
    let file = Path::new(&config.output_file);
    if file.is_absolute() {
        file.to_path_buf()
    } else {
        resolve_output_dir(config).join(file)
    }
}

/// Append the measured rows to the feature CSV.
///
/// The header is written when the file is fresh. With `no_append` set
/// the file is truncated first, so the result holds exactly this batch.
pub fn write_features_csv<P: AsRef<Path>>(
    path: P,
    rows: &[FeatureRow],
    config: &Config,
) -> Result<()> {
    let path = path.as_ref();
    let file_exists = path.exists();

    if !config.no_append && file_exists && config.verbose {
        eprintln!(
            "Warning: Output file {} already exists. Appending results.",
            path.display()
        );
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(RootMorphError::Io)?;
        }
    }

    let file = if config.no_append {
        fs::File::create(path)
    } else {
        fs::OpenOptions::new().create(true).append(true).open(path)
    }
    .map_err(RootMorphError::Io)?;

    let mut writer = Writer::from_writer(file);

    if !file_exists || config.no_append {
        let header = csv_header(
            config.root_type,
            config.convert_units,
            config.diameter_ranges.len() + 1,
        );
        writer
            .write_record(&header)
            .map_err(RootMorphError::CsvOutput)?;
    }

    for row in rows {
        writer
            .write_record(&row.features.csv_record(&row.filename, &row.region, config.root_type))
            .map_err(RootMorphError::CsvOutput)?;
    }

    writer
        .flush()
        .map_err(|e| RootMorphError::CsvOutput(csv::Error::from(e)))?;

    Ok(())
}
