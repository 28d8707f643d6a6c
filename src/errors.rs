// src/errors.rs - Error types shared by the analysis stages

use thiserror::Error;
use std::io;
use std::path::PathBuf;

/// Custom error types for RootMorphR
#[derive(Error, Debug)]
pub enum RootMorphError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid image {0}: input has zero area")]
    InvalidImage(String),

    #[error("Degenerate skeleton: {0}")]
    DegenerateSkeleton(String),

    #[error("Empty topology: {0}")]
    EmptyTopology(String),

    #[error("CSV output error: {0}")]
    CsvOutput(#[from] csv::Error),

    #[error("Region of interest error: {0}")]
    Roi(String),

    #[error("Invalid input path: {0}")]
    InvalidPath(PathBuf),

    #[error("Unexpected error: {0}")]
    Other(String),
}

/// Type alias for Result with our custom error type
pub type Result<T> = std::result::Result<T, RootMorphError>;
