// src/segmentation.rs - Threshold segmentation and contour smoothing

use image::{GrayImage, Luma};
use imageproc::contours::{find_contours, BorderType, Contour};
use imageproc::drawing::{draw_line_segment_mut, draw_polygon_mut};
use imageproc::geometry::approximate_polygon_dp;
use imageproc::point::Point;

use crate::config::Config;
use crate::errors::{Result, RootMorphError};

pub const FOREGROUND: u8 = 255;
pub const BACKGROUND: u8 = 0;

/// Segment a grayscale image into a binary root mask.
///
/// Pixels at or below the threshold are classified as root by default,
/// since roots are darker than the scanner background. The invert flag
/// flips this polarity for backlit or fluorescence images.
pub fn segment(image: &GrayImage, config: &Config, name: &str) -> Result<GrayImage> {
    let (width, height) = image.dimensions();

    if width == 0 || height == 0 {
        return Err(RootMorphError::InvalidImage(name.to_string()));
    }

    let threshold = config.threshold.min(255) as u8;
    let mut mask = GrayImage::new(width, height);

    for y in 0..height {
        for x in 0..width {
            let value = image.get_pixel(x, y)[0];
            let is_root = if config.invert {
                value > threshold
            } else {
                value <= threshold
            };
            let mask_value = if is_root { FOREGROUND } else { BACKGROUND };
            mask.put_pixel(x, y, Luma([mask_value]));
        }
    }

    if config.enable_smoothing {
        mask = smooth_mask(&mask, config.smooth_threshold);
    }

    Ok(mask)
}

/// Replace the mask boundary with a reduced-vertex polygon approximation
/// and re-rasterize it, so downstream perimeter and area statistics
/// reflect the smoothed outline instead of pixel staircases.
pub fn smooth_mask(mask: &GrayImage, tolerance: f64) -> GrayImage {
    let (width, height) = mask.dimensions();
    let contours: Vec<Contour<i32>> = find_contours(mask);

    if contours.is_empty() {
        return mask.clone();
    }

    // Fill outer boundaries before the holes they contain, walking the
    // nesting hierarchy from the outside in
    let mut order: Vec<usize> = (0..contours.len()).collect();
    order.sort_by_key(|&idx| contour_depth(&contours, idx));

    let mut smoothed = GrayImage::new(width, height);

    for idx in order {
        let contour = &contours[idx];
        let fill = match contour.border_type {
            BorderType::Outer => Luma([FOREGROUND]),
            BorderType::Hole => Luma([BACKGROUND]),
        };

        let mut polygon = approximate_polygon_dp(&contour.points, tolerance, true);

        // draw_polygon_mut requires an open path
        while polygon.len() > 1 && polygon.first() == polygon.last() {
            polygon.pop();
        }

        if polygon.len() >= 3 {
            draw_polygon_mut(&mut smoothed, &polygon, fill);
        } else if polygon.len() == 2 {
            draw_line_segment_mut(
                &mut smoothed,
                (polygon[0].x as f32, polygon[0].y as f32),
                (polygon[1].x as f32, polygon[1].y as f32),
                fill,
            );
        } else if let Some(point) = polygon.first() {
            put_if_in_bounds(&mut smoothed, point.x, point.y, fill);
        }
    }

    smoothed
}

fn contour_depth(contours: &[Contour<i32>], idx: usize) -> usize {
    let mut depth = 0;
    let mut parent = contours[idx].parent;
    while let Some(p) = parent {
        depth += 1;
        parent = contours[p].parent;
    }
    depth
}

fn put_if_in_bounds(mask: &mut GrayImage, x: i32, y: i32, value: Luma<u8>) {
    let (width, height) = mask.dimensions();
    if x >= 0 && y >= 0 && (x as u32) < width && (y as u32) < height {
        mask.put_pixel(x as u32, y as u32, value);
    }
}

/// Count foreground pixels in a mask
pub fn foreground_area(mask: &GrayImage) -> u64 {
    mask.pixels().filter(|p| p[0] > 0).count() as u64
}

/// Extract all outer boundary contours of a mask, used for perimeter
/// measurement and contour overlays
pub fn outer_contours(mask: &GrayImage) -> Vec<Vec<Point<i32>>> {
    find_contours::<i32>(mask)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer)
        .map(|c| c.points)
        .collect()
}

/// Extract all hole boundary contours of a mask
pub fn hole_contours(mask: &GrayImage) -> Vec<Vec<Point<i32>>> {
    find_contours::<i32>(mask)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Hole)
        .map(|c| c.points)
        .collect()
}
