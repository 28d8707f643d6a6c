/// Synthetic grayscale scans shared by the integration tests: dark root
/// shapes on a light background, segmentable at the default threshold.
use image::{GrayImage, Luma};

pub const LIGHT: u8 = 250;
pub const DARK: u8 = 20;

pub fn light_scan(width: u32, height: u32) -> GrayImage {
    GrayImage::from_pixel(width, height, Luma([LIGHT]))
}

/// Fill a disk with the given intensity
pub fn fill_disk(scan: &mut GrayImage, cx: i32, cy: i32, r: i32, value: u8) {
    let (width, height) = scan.dimensions();
    for y in 0..height as i32 {
        for x in 0..width as i32 {
            let dx = x - cx;
            let dy = y - cy;
            if dx * dx + dy * dy <= r * r {
                scan.put_pixel(x as u32, y as u32, Luma([value]));
            }
        }
    }
}

/// Dark horizontal band covering the inclusive pixel ranges
pub fn draw_band(scan: &mut GrayImage, x0: u32, x1: u32, y0: u32, y1: u32) {
    for y in y0..=y1 {
        for x in x0..=x1 {
            scan.put_pixel(x, y, Luma([DARK]));
        }
    }
}

/// Vertical trunk forking into two diagonal laterals, a short one of 10
/// steps and a long one of 18. One pixel wide, so the shape is its own
/// skeleton.
pub fn forked_root_scan() -> GrayImage {
    let mut scan = light_scan(60, 60);
    for y in 5..=20 {
        scan.put_pixel(20, y, Luma([DARK]));
    }
    for t in 1..=10u32 {
        scan.put_pixel(20 - t, 20 + t, Luma([DARK]));
    }
    for t in 1..=18u32 {
        scan.put_pixel(20 + t, 20 + t, Luma([DARK]));
    }
    scan
}
