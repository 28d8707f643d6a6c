// src/roi.rs - Region-of-interest annotations applied to input images

use std::fs::File;
use std::io;
use std::path::Path;

use image::GrayImage;

use crate::errors::{Result, RootMorphError};

/// Region name used for rows measured over the full image
pub const FULL_IMAGE: &str = "Full";

/// One rectangular region of interest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub name: String,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    /// Whether the rectangle fits inside an image of the given size.
    /// The right and bottom edges need one pixel of slack.
    pub fn fits(&self, image_width: u32, image_height: u32) -> bool {
        self.x + self.width + 1 <= image_width && self.y + self.height + 1 <= image_height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Read region annotations from a CSV file of `name,x,y,width,height`
/// rows. A leading header row is detected and skipped.
pub fn load_regions<P: AsRef<Path>>(path: P) -> Result<Vec<Region>> {
    let file = File::open(path.as_ref()).map_err(RootMorphError::Io)?;
    parse_regions(file)
}

fn parse_regions<R: io::Read>(reader: R) -> Result<Vec<Region>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let mut regions = Vec::new();
    for (row, record) in csv_reader.records().enumerate() {
        let record = record.map_err(RootMorphError::CsvOutput)?;
        if record.len() < 5 {
            return Err(RootMorphError::Roi(format!(
                "row {} has {} fields, expected name,x,y,width,height",
                row + 1,
                record.len()
            )));
        }

        let numbers: std::result::Result<Vec<u32>, _> =
            (1..5).map(|i| record[i].parse::<u32>()).collect();

        match numbers {
            Ok(values) => regions.push(Region {
                name: record[0].to_string(),
                x: values[0],
                y: values[1],
                width: values[2],
                height: values[3],
            }),
            // Only the first row may fail to parse: that is the header
            Err(_) if row == 0 => continue,
            Err(_) => {
                return Err(RootMorphError::Roi(format!(
                    "row {} has non-numeric coordinates",
                    row + 1
                )));
            }
        }
    }

    Ok(regions)
}

/// Cut the region out of the image
pub fn crop(image: &GrayImage, region: &Region) -> GrayImage {
    image::imageops::crop_imm(image, region.x, region.y, region.width, region.height).to_image()
}
