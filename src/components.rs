// src/components.rs - Connected component filtering of the binary mask

use image::{GrayImage, Luma};
use imageproc::region_labelling::{connected_components, Connectivity};

use crate::config::Config;
use crate::segmentation::{BACKGROUND, FOREGROUND};

/// Counts of what the component filters removed, for verbose reporting
#[derive(Debug, Default, Clone, Copy)]
pub struct FilterStats {
    pub removed_foreground: u32,
    pub filled_holes: u32,
    pub discarded_by_keep_largest: u32,
}

/// Apply the configured component filters to a binary mask.
///
/// Noise filters run first, keep-largest last. Component sizes are
/// compared as fractions of the total image area, and components larger
/// than the configured maximum are the ones removed.
pub fn filter_components(mask: &GrayImage, config: &Config) -> (GrayImage, FilterStats) {
    let mut cleaned = mask.clone();
    let mut stats = FilterStats::default();

    if config.filter_fg_noise {
        stats.removed_foreground = remove_large_foreground(&mut cleaned, config.max_fg_size);
    }

    if config.filter_bg_noise {
        stats.filled_holes = fill_large_holes(&mut cleaned, config.max_bg_size);
    }

    if config.keep_largest {
        stats.discarded_by_keep_largest = keep_largest_component(&mut cleaned);
    }

    (cleaned, stats)
}

/// Remove foreground components whose area fraction exceeds the maximum
fn remove_large_foreground(mask: &mut GrayImage, max_fraction: f64) -> u32 {
    let (width, height) = mask.dimensions();
    let total_area = (width as f64) * (height as f64);
    if total_area == 0.0 {
        return 0;
    }

    let labels = connected_components(mask, Connectivity::Eight, Luma([BACKGROUND]));
    let areas = component_areas(&labels);

    let mut removed = 0u32;
    let remove: Vec<bool> = areas
        .iter()
        .map(|&area| area as f64 / total_area > max_fraction)
        .collect();

    for flag in remove.iter().skip(1) {
        if *flag {
            removed += 1;
        }
    }

    if removed > 0 {
        for y in 0..height {
            for x in 0..width {
                let label = labels.get_pixel(x, y)[0] as usize;
                if label > 0 && remove[label] {
                    mask.put_pixel(x, y, Luma([BACKGROUND]));
                }
            }
        }
    }

    removed
}

/// Fill enclosed background components (holes) whose area fraction
/// exceeds the maximum. The outer background is never a candidate.
fn fill_large_holes(mask: &mut GrayImage, max_fraction: f64) -> u32 {
    let (width, height) = mask.dimensions();
    let total_area = (width as f64) * (height as f64);
    if total_area == 0.0 {
        return 0;
    }

    let inverted = invert_mask(mask);

    // Holes are 4-connected, complementary to the 8-connected foreground
    let labels = connected_components(&inverted, Connectivity::Four, Luma([BACKGROUND]));
    let areas = component_areas(&labels);
    let touches_border = border_touching_labels(&labels, &areas);

    let fill: Vec<bool> = areas
        .iter()
        .enumerate()
        .map(|(label, &area)| {
            label > 0 && !touches_border[label] && area as f64 / total_area > max_fraction
        })
        .collect();

    let filled = fill.iter().filter(|f| **f).count() as u32;

    if filled > 0 {
        for y in 0..height {
            for x in 0..width {
                let label = labels.get_pixel(x, y)[0] as usize;
                if fill[label] {
                    mask.put_pixel(x, y, Luma([FOREGROUND]));
                }
            }
        }
    }

    filled
}

/// Keep only the largest foreground component, returning the number of
/// discarded components
fn keep_largest_component(mask: &mut GrayImage) -> u32 {
    let (width, height) = mask.dimensions();
    let labels = connected_components(mask, Connectivity::Eight, Luma([BACKGROUND]));
    let areas = component_areas(&labels);

    if areas.len() <= 2 {
        // Zero or one foreground component, nothing to discard
        return 0;
    }

    let mut largest = 1usize;
    for label in 2..areas.len() {
        if areas[label] > areas[largest] {
            largest = label;
        }
    }

    for y in 0..height {
        for x in 0..width {
            let label = labels.get_pixel(x, y)[0] as usize;
            if label > 0 && label != largest {
                mask.put_pixel(x, y, Luma([BACKGROUND]));
            }
        }
    }

    (areas.len() - 2) as u32
}

/// Pixel count per component label; index 0 is the background
fn component_areas(labels: &image::ImageBuffer<Luma<u32>, Vec<u32>>) -> Vec<u64> {
    let max_label = labels.pixels().map(|p| p[0]).max().unwrap_or(0) as usize;
    let mut areas = vec![0u64; max_label + 1];
    for pixel in labels.pixels() {
        areas[pixel[0] as usize] += 1;
    }
    areas
}

fn invert_mask(mask: &GrayImage) -> GrayImage {
    let (width, height) = mask.dimensions();
    let mut inverted = GrayImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let value = if mask.get_pixel(x, y)[0] > 0 {
                BACKGROUND
            } else {
                FOREGROUND
            };
            inverted.put_pixel(x, y, Luma([value]));
        }
    }
    inverted
}

/// Labels of background components reachable from the image border
fn border_touching_labels(
    labels: &image::ImageBuffer<Luma<u32>, Vec<u32>>,
    areas: &[u64],
) -> Vec<bool> {
    let (width, height) = labels.dimensions();
    let mut touches = vec![false; areas.len()];
    for x in 0..width {
        touches[labels.get_pixel(x, 0)[0] as usize] = true;
        touches[labels.get_pixel(x, height - 1)[0] as usize] = true;
    }
    for y in 0..height {
        touches[labels.get_pixel(0, y)[0] as usize] = true;
        touches[labels.get_pixel(width - 1, y)[0] as usize] = true;
    }
    touches
}

/// Areas of the enclosed background regions in the mask, one entry per
/// hole. Background that reaches the image border does not count.
pub fn enclosed_hole_areas(mask: &GrayImage) -> Vec<u64> {
    let (width, height) = mask.dimensions();
    if width == 0 || height == 0 {
        return Vec::new();
    }

    let inverted = invert_mask(mask);
    let labels = connected_components(&inverted, Connectivity::Four, Luma([BACKGROUND]));
    let areas = component_areas(&labels);
    let touches_border = border_touching_labels(&labels, &areas);

    areas
        .iter()
        .enumerate()
        .filter(|&(label, &area)| label > 0 && !touches_border[label] && area > 0)
        .map(|(_, &area)| area)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank_mask(width: u32, height: u32) -> GrayImage {
        GrayImage::from_pixel(width, height, Luma([BACKGROUND]))
    }

    fn fill_rect(mask: &mut GrayImage, x0: u32, y0: u32, x1: u32, y1: u32, value: u8) {
        for y in y0..y1 {
            for x in x0..x1 {
                mask.put_pixel(x, y, Luma([value]));
            }
        }
    }

    #[test]
    fn keep_largest_discards_smaller_components() {
        let mut mask = blank_mask(40, 40);
        fill_rect(&mut mask, 2, 2, 12, 12, FOREGROUND); // 100 px
        fill_rect(&mut mask, 25, 25, 29, 29, FOREGROUND); // 16 px

        let mut config = Config::default();
        config.keep_largest = true;
        config.filter_bg_noise = false;
        config.filter_fg_noise = false;

        let (cleaned, stats) = filter_components(&mask, &config);

        assert_eq!(stats.discarded_by_keep_largest, 1);
        assert_eq!(cleaned.get_pixel(5, 5)[0], FOREGROUND);
        assert_eq!(cleaned.get_pixel(26, 26)[0], BACKGROUND);
    }

    #[test]
    fn foreground_filter_removes_components_above_max_size() {
        let mut mask = blank_mask(40, 40);
        fill_rect(&mut mask, 2, 2, 22, 22, FOREGROUND); // 400 px = 25% of image
        fill_rect(&mut mask, 30, 30, 34, 34, FOREGROUND); // 16 px = 1%

        let mut config = Config::default();
        config.keep_largest = false;
        config.filter_fg_noise = true;
        config.max_fg_size = 0.1;

        let (cleaned, stats) = filter_components(&mask, &config);

        assert_eq!(stats.removed_foreground, 1);
        assert_eq!(cleaned.get_pixel(5, 5)[0], BACKGROUND);
        assert_eq!(cleaned.get_pixel(31, 31)[0], FOREGROUND);
    }

    #[test]
    fn hole_filter_fills_enclosed_background_only() {
        let mut mask = blank_mask(40, 40);
        fill_rect(&mut mask, 5, 5, 35, 35, FOREGROUND);
        fill_rect(&mut mask, 12, 12, 28, 28, BACKGROUND); // 256 px hole = 16%

        let mut config = Config::default();
        config.keep_largest = false;
        config.filter_bg_noise = true;
        config.max_bg_size = 0.05;

        let (cleaned, stats) = filter_components(&mask, &config);

        assert_eq!(stats.filled_holes, 1);
        assert_eq!(cleaned.get_pixel(20, 20)[0], FOREGROUND);
        // Outer background stays untouched no matter its size
        assert_eq!(cleaned.get_pixel(0, 0)[0], BACKGROUND);
    }

    #[test]
    fn small_holes_survive_the_hole_filter() {
        let mut mask = blank_mask(40, 40);
        fill_rect(&mut mask, 5, 5, 35, 35, FOREGROUND);
        fill_rect(&mut mask, 18, 18, 21, 21, BACKGROUND); // 9 px hole

        let mut config = Config::default();
        config.keep_largest = false;
        config.filter_bg_noise = true;
        config.max_bg_size = 0.05;

        let (cleaned, stats) = filter_components(&mask, &config);

        assert_eq!(stats.filled_holes, 0);
        assert_eq!(cleaned.get_pixel(19, 19)[0], BACKGROUND);
    }

    #[test]
    fn hole_areas_count_enclosed_background_only() {
        let mut mask = blank_mask(40, 40);
        fill_rect(&mut mask, 5, 5, 35, 35, FOREGROUND);
        fill_rect(&mut mask, 10, 10, 14, 14, BACKGROUND); // 16 px
        fill_rect(&mut mask, 20, 20, 30, 30, BACKGROUND); // 100 px

        let mut areas = enclosed_hole_areas(&mask);
        areas.sort_unstable();
        assert_eq!(areas, vec![16, 100]);

        let solid = blank_mask(20, 20);
        assert!(enclosed_hole_areas(&solid).is_empty());
    }

    #[test]
    fn filters_disabled_leave_mask_unchanged() {
        let mut mask = blank_mask(20, 20);
        fill_rect(&mut mask, 2, 2, 6, 6, FOREGROUND);
        fill_rect(&mut mask, 10, 10, 18, 18, FOREGROUND);

        let mut config = Config::default();
        config.keep_largest = false;
        config.filter_bg_noise = false;
        config.filter_fg_noise = false;

        let (cleaned, _) = filter_components(&mask, &config);
        assert_eq!(cleaned.as_raw(), mask.as_raw());
    }
}
