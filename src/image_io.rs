// src/image_io.rs - Image loading, saving and input file discovery

use std::fs;
use std::path::{Path, PathBuf};

use image::{GrayImage, ImageFormat, RgbImage};

use crate::errors::{Result, RootMorphError};

/// File extensions accepted as input images
const SUPPORTED_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "bmp", "tif", "tiff"];

/// Represents an input image with its metadata
pub struct InputImage {
    pub image: GrayImage,
    pub path: PathBuf,
    pub filename: String,
}

/// Check whether a path has a supported image extension
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let lower = ext.to_ascii_lowercase();
            SUPPORTED_EXTENSIONS.iter().any(|s| *s == lower)
        })
        .unwrap_or(false)
}

/// Collect all supported image files from a file or directory path
pub fn collect_image_files<P: AsRef<Path>>(input_path: P, recursive: bool) -> Result<Vec<PathBuf>> {
    let input_path = input_path.as_ref();

    if !input_path.exists() {
        return Err(RootMorphError::InvalidPath(input_path.to_path_buf()));
    }

    let mut files = Vec::new();

    if input_path.is_file() {
        if is_supported_image(input_path) {
            files.push(input_path.to_path_buf());
        } else {
            return Err(RootMorphError::Config(format!(
                "{} is not a supported image file",
                input_path.display()
            )));
        }
    } else if input_path.is_dir() {
        collect_from_dir(input_path, recursive, &mut files)?;
        files.sort();
    } else {
        return Err(RootMorphError::InvalidPath(input_path.to_path_buf()));
    }

    Ok(files)
}

fn collect_from_dir(dir_path: &Path, recursive: bool, result: &mut Vec<PathBuf>) -> Result<()> {
    let entries = fs::read_dir(dir_path).map_err(RootMorphError::Io)?;

    for entry in entries {
        let entry = entry.map_err(RootMorphError::Io)?;
        let path = entry.path();

        if path.is_dir() {
            if recursive {
                collect_from_dir(&path, recursive, result)?;
            }
        } else if path.is_file() && is_supported_image(&path) {
            result.push(path);
        }
    }

    Ok(())
}

/// Load an image ensuring 8-bit grayscale format
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<InputImage> {
    let path = path.as_ref();

    // Get filename without extension
    let filename = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| RootMorphError::InvalidPath(path.to_path_buf()))?
        .to_string();

    let img = image::open(path).map_err(RootMorphError::Image)?;

    // Convert to grayscale; color scans carry no extra information for
    // intensity thresholding
    let gray_img = img.to_luma8();

    Ok(InputImage {
        image: gray_img,
        path: path.to_path_buf(),
        filename,
    })
}

/// Save a grayscale image to the specified path as PNG
pub fn save_gray_image<P: AsRef<Path>>(image: &GrayImage, path: P) -> Result<()> {
    image
        .save_with_format(path, ImageFormat::Png)
        .map_err(RootMorphError::Image)?;

    Ok(())
}

/// Save an RGB image to the specified path as PNG
pub fn save_rgb_image<P: AsRef<Path>>(image: &RgbImage, path: P) -> Result<()> {
    image
        .save_with_format(path, ImageFormat::Png)
        .map_err(RootMorphError::Image)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supported_extensions_are_case_insensitive() {
        assert!(is_supported_image(Path::new("root.PNG")));
        assert!(is_supported_image(Path::new("root.Tif")));
        assert!(is_supported_image(Path::new("scan.jpeg")));
        assert!(!is_supported_image(Path::new("notes.txt")));
        assert!(!is_supported_image(Path::new("no_extension")));
    }
}
