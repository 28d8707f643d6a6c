// src/overlay.rs - Rendering of segmented and annotated output images

use std::collections::VecDeque;

use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};
use imageproc::geometry::convex_hull;
use imageproc::point::Point;

use crate::buckets::bucket_index;
use crate::config::{Config, RootType};
use crate::segmentation::{self, FOREGROUND};
use crate::skeleton::{DistanceField, SkeletonGraph};

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
const CONTOUR_COLOR: Rgb<u8> = Rgb([255, 140, 0]);
const HOLE_COLOR: Rgb<u8> = Rgb([0, 170, 170]);
const HULL_COLOR: Rgb<u8> = Rgb([255, 0, 255]);

/// Colors cycled over diameter ranges or topological depth levels
const PALETTE: [Rgb<u8>; 6] = [
    Rgb([220, 20, 60]),
    Rgb([46, 139, 87]),
    Rgb([30, 144, 255]),
    Rgb([255, 165, 0]),
    Rgb([148, 0, 211]),
    Rgb([0, 206, 209]),
];

/// Binary mask rendered as black roots on a white page
pub fn render_segmented(mask: &GrayImage) -> GrayImage {
    let (width, height) = mask.dimensions();
    let mut out = GrayImage::from_pixel(width, height, Luma([255]));
    for y in 0..height {
        for x in 0..width {
            if mask.get_pixel(x, y)[0] > 0 {
                out.put_pixel(x, y, Luma([0]));
            }
        }
    }
    out
}

/// Annotated image: root body with optional distance shading, hole and
/// outer contours, convex hull, and the medial axis colored by diameter
/// range or by topological depth.
pub fn render_processed(
    mask: &GrayImage,
    distance: &DistanceField,
    graph: &SkeletonGraph,
    thresholds_px: &[f64],
    config: &Config,
) -> RgbImage {
    let (width, height) = mask.dimensions();
    let mut canvas = RgbImage::from_pixel(width, height, WHITE);

    let max_radius = distance.max_radius().max(1.0);
    for y in 0..height {
        for x in 0..width {
            if mask.get_pixel(x, y)[0] != FOREGROUND {
                continue;
            }
            if config.show_distance_map {
                let ratio = distance.radius(x, y) / max_radius;
                canvas.put_pixel(x, y, distance_shade(ratio));
            } else {
                canvas.put_pixel(x, y, BLACK);
            }
        }
    }

    // Hull, hole, and contour annotations belong to the whole-root
    // schema; broken-root output keeps only the body and medial axis
    let whole = config.root_type == RootType::Whole;

    if whole && config.show_holes {
        for contour in segmentation::hole_contours(mask) {
            draw_chain(&mut canvas, &contour, config.contour_width, HOLE_COLOR);
        }
    }

    if whole && config.show_contours {
        for contour in segmentation::outer_contours(mask) {
            draw_chain(&mut canvas, &contour, config.contour_width, CONTOUR_COLOR);
        }
    }

    if whole && config.show_convex_hull {
        draw_hull(&mut canvas, mask);
    }

    if config.show_medial_axis {
        draw_medial_axis(&mut canvas, distance, graph, thresholds_px, config);
    }

    canvas
}

fn distance_shade(ratio: f64) -> Rgb<u8> {
    let ratio = ratio.clamp(0.0, 1.0);
    let warm = (255.0 * ratio) as u8;
    let cool = (255.0 * (1.0 - ratio)) as u8;
    Rgb([warm, 0, cool])
}

/// Plot every pixel of a contour chain, thickened when asked
fn draw_chain(canvas: &mut RgbImage, points: &[Point<i32>], width: u32, color: Rgb<u8>) {
    let (w, h) = canvas.dimensions();
    for point in points {
        if width <= 1 {
            if point.x >= 0 && point.y >= 0 && (point.x as u32) < w && (point.y as u32) < h {
                canvas.put_pixel(point.x as u32, point.y as u32, color);
            }
        } else {
            draw_filled_circle_mut(canvas, (point.x, point.y), (width / 2) as i32, color);
        }
    }
}

fn draw_hull(canvas: &mut RgbImage, mask: &GrayImage) {
    let (width, height) = mask.dimensions();
    let mut points = Vec::new();
    for y in 0..height {
        for x in 0..width {
            if mask.get_pixel(x, y)[0] > 0 {
                points.push(Point::new(x as i32, y as i32));
            }
        }
    }
    if points.len() < 3 {
        return;
    }

    let hull = convex_hull(&points);
    for i in 0..hull.len() {
        let p = hull[i];
        let q = hull[(i + 1) % hull.len()];
        draw_line_segment_mut(
            canvas,
            (p.x as f32, p.y as f32),
            (q.x as f32, q.y as f32),
            HULL_COLOR,
        );
    }
}

fn draw_medial_axis(
    canvas: &mut RgbImage,
    distance: &DistanceField,
    graph: &SkeletonGraph,
    thresholds_px: &[f64],
    config: &Config,
) {
    let depths = if config.color_axis_by_diameter {
        Vec::new()
    } else {
        segment_depths(graph)
    };

    let radius = (config.medial_axis_width / 2) as i32;
    for (index, segment) in graph.segments.iter().enumerate() {
        for &(x, y) in &segment.pixels {
            let color = if config.color_axis_by_diameter {
                let diameter = 2.0 * distance.radius(x, y);
                PALETTE[bucket_index(thresholds_px, diameter) % PALETTE.len()]
            } else {
                PALETTE[depths[index] % PALETTE.len()]
            };
            if radius == 0 {
                canvas.put_pixel(x, y, color);
            } else {
                draw_filled_circle_mut(canvas, (x as i32, y as i32), radius, color);
            }
        }
    }
}

/// Breadth-first level of every segment, starting at the topmost node
/// of each connected part. Primary roots come out level zero and each
/// branching step increases the level by one.
fn segment_depths(graph: &SkeletonGraph) -> Vec<usize> {
    let mut depths = vec![0usize; graph.segments.len()];
    let mut segment_seen = vec![false; graph.segments.len()];
    let mut node_level: Vec<Option<usize>> = vec![None; graph.nodes.len()];

    let mut order: Vec<usize> = (0..graph.nodes.len()).collect();
    order.sort_by_key(|&n| graph.nodes[n].1);

    for &root in &order {
        if node_level[root].is_some() {
            continue;
        }
        node_level[root] = Some(0);
        let mut queue = VecDeque::from([root]);

        while let Some(node) = queue.pop_front() {
            let level = match node_level[node] {
                Some(level) => level,
                None => continue,
            };
            for s in graph.incident_segments(node) {
                if segment_seen[s] {
                    continue;
                }
                segment_seen[s] = true;
                depths[s] = level;

                let segment = &graph.segments[s];
                let other = if segment.start == node {
                    segment.end
                } else {
                    segment.start
                };
                if node_level[other].is_none() {
                    node_level[other] = Some(level + 1);
                    queue.push_back(other);
                }
            }
        }
    }

    depths
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segmentation::BACKGROUND;
    use crate::skeleton;

    fn band_mask() -> GrayImage {
        let mut mask = GrayImage::from_pixel(60, 20, Luma([BACKGROUND]));
        for y in 8..=10 {
            for x in 10..=50 {
                mask.put_pixel(x, y, Luma([FOREGROUND]));
            }
        }
        mask
    }

    fn plain_config() -> Config {
        let mut config = Config::default();
        config.show_convex_hull = false;
        config.show_holes = false;
        config.show_contours = false;
        config.show_medial_axis = false;
        config.show_distance_map = false;
        config
    }

    #[test]
    fn segmented_image_is_black_on_white() {
        let mask = band_mask();
        let rendered = render_segmented(&mask);
        assert_eq!(rendered.get_pixel(30, 9)[0], 0);
        assert_eq!(rendered.get_pixel(0, 0)[0], 255);
    }

    #[test]
    fn body_renders_black_with_everything_off() {
        let mask = band_mask();
        let skeleton = skeleton::build(&mask, "band").unwrap();
        let canvas = render_processed(&mask, &skeleton.distance, &skeleton.graph, &[], &plain_config());

        assert_eq!(*canvas.get_pixel(30, 9), BLACK);
        assert_eq!(*canvas.get_pixel(0, 0), WHITE);
    }

    #[test]
    fn medial_axis_paints_the_center_row() {
        let mask = band_mask();
        let skeleton = skeleton::build(&mask, "band").unwrap();
        let mut config = plain_config();
        config.show_medial_axis = true;
        config.medial_axis_width = 1;

        let canvas = render_processed(
            &mask,
            &skeleton.distance,
            &skeleton.graph,
            &[2.0, 5.0],
            &config,
        );

        // Center of a three pixel band has diameter four: second bucket
        assert_eq!(*canvas.get_pixel(30, 9), PALETTE[1]);
    }

    #[test]
    fn hull_outline_is_traced_for_whole_roots() {
        let mask = band_mask();
        let skeleton = skeleton::build(&mask, "band").unwrap();
        let mut config = plain_config();
        config.root_type = RootType::Whole;
        config.show_convex_hull = true;

        let canvas = render_processed(&mask, &skeleton.distance, &skeleton.graph, &[], &config);

        // The top hull edge runs along y = 8 between the band corners
        assert_eq!(*canvas.get_pixel(30, 8), HULL_COLOR);
        // The hull is an outline, not a fill
        assert_eq!(*canvas.get_pixel(30, 9), BLACK);
    }

    #[test]
    fn broken_roots_skip_contour_annotations() {
        let mask = band_mask();
        let skeleton = skeleton::build(&mask, "band").unwrap();
        let mut config = plain_config();
        config.show_contours = true;

        config.root_type = RootType::Broken;
        let canvas = render_processed(&mask, &skeleton.distance, &skeleton.graph, &[], &config);
        assert_eq!(*canvas.get_pixel(30, 8), BLACK);

        config.root_type = RootType::Whole;
        let canvas = render_processed(&mask, &skeleton.distance, &skeleton.graph, &[], &config);
        assert_eq!(*canvas.get_pixel(30, 8), CONTOUR_COLOR);
    }

    #[test]
    fn distance_map_shades_the_body() {
        let mask = band_mask();
        let skeleton = skeleton::build(&mask, "band").unwrap();
        let mut config = plain_config();
        config.show_distance_map = true;

        let canvas = render_processed(&mask, &skeleton.distance, &skeleton.graph, &[], &config);
        let center = *canvas.get_pixel(30, 9);
        assert_ne!(center, BLACK);
        assert_ne!(center, WHITE);
    }

    #[test]
    fn depth_levels_grow_at_branches() {
        let mut mask = GrayImage::from_pixel(40, 40, Luma([BACKGROUND]));
        for y in 5..=20 {
            mask.put_pixel(20, y, Luma([FOREGROUND]));
        }
        for t in 1..=10u32 {
            mask.put_pixel(20 - t, 20 + t, Luma([FOREGROUND]));
            mask.put_pixel(20 + t, 20 + t, Luma([FOREGROUND]));
        }

        let skeleton = skeleton::build(&mask, "y").unwrap();
        let depths = segment_depths(&skeleton.graph);
        assert_eq!(depths.len(), 3);
        // The vertical arm starts at the topmost tip; the two lower arms
        // hang one branching level below it
        let mut sorted = depths.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![0, 1, 1]);
    }
}
