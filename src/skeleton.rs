// src/skeleton.rs - Distance transform, thinning and skeleton graph extraction

use std::collections::HashSet;

use image::{GrayImage, Luma};
use imageproc::distance_transform::euclidean_squared_distance_transform;

use crate::errors::{Result, RootMorphError};
use crate::segmentation::{BACKGROUND, FOREGROUND};

pub const SQRT_2: f64 = std::f64::consts::SQRT_2;

const NEIGHBOR_OFFSETS: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Euclidean distance of every foreground pixel to the nearest background
/// pixel. The value at a skeleton pixel is the local root radius.
pub struct DistanceField {
    width: u32,
    height: u32,
    data: Vec<f64>,
}

impl DistanceField {
    pub fn from_mask(mask: &GrayImage) -> Self {
        let (width, height) = mask.dimensions();

        // The transform measures distance to the nearest non-zero pixel,
        // so feed it the inverted mask to measure distance to background
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

        let squared = euclidean_squared_distance_transform(&inverted);

        // A mask without any background pixel has unbounded distances
        let cap = width.max(height) as f64;
        let data = squared
            .pixels()
            .map(|p| {
                let d = p[0].sqrt();
                if d.is_finite() {
                    d
                } else {
                    cap
                }
            })
            .collect();

        Self {
            width,
            height,
            data,
        }
    }

    #[inline]
    pub fn radius(&self, x: u32, y: u32) -> f64 {
        self.data[(y * self.width + x) as usize]
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn max_radius(&self) -> f64 {
        self.data.iter().cloned().fold(0.0, f64::max)
    }
}

/// Thin a binary mask to a one pixel wide skeleton using the Guo-Hall
/// two-subiteration algorithm. The result is a fixed point: thinning an
/// already thinned mask changes nothing.
pub fn thin_mask(mask: &GrayImage) -> GrayImage {
    let (width, height) = mask.dimensions();
    let w = width as usize;
    let h = height as usize;
    let mut grid: Vec<bool> = mask.pixels().map(|p| p[0] > 0).collect();
    let mut to_delete: Vec<usize> = Vec::new();

    loop {
        let mut changed = false;

        for subiteration in 0..2 {
            to_delete.clear();

            for y in 0..h {
                for x in 0..w {
                    let index = y * w + x;
                    if grid[index] && guo_hall_removable(&grid, w, h, x, y, subiteration) {
                        to_delete.push(index);
                    }
                }
            }

            if !to_delete.is_empty() {
                changed = true;
                for &index in &to_delete {
                    grid[index] = false;
                }
            }
        }

        if !changed {
            break;
        }
    }

    let mut thinned = GrayImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            if grid[y as usize * w + x as usize] {
                thinned.put_pixel(x, y, Luma([FOREGROUND]));
            }
        }
    }

    thinned
}

/// Guo-Hall deletion test for one pixel.
///
/// Neighborhood labels, clockwise from north:
///   p9 p2 p3
///   p8  * p4
///   p7 p6 p5
fn guo_hall_removable(grid: &[bool], w: usize, h: usize, x: usize, y: usize, subiteration: usize) -> bool {
    let at = |dx: i32, dy: i32| -> bool {
        let nx = x as i32 + dx;
        let ny = y as i32 + dy;
        if nx < 0 || ny < 0 || nx >= w as i32 || ny >= h as i32 {
            return false;
        }
        grid[ny as usize * w + nx as usize]
    };

    let p2 = at(0, -1);
    let p3 = at(1, -1);
    let p4 = at(1, 0);
    let p5 = at(1, 1);
    let p6 = at(0, 1);
    let p7 = at(-1, 1);
    let p8 = at(-1, 0);
    let p9 = at(-1, -1);

    let c = (!p2 && (p3 || p4)) as u32
        + (!p4 && (p5 || p6)) as u32
        + (!p6 && (p7 || p8)) as u32
        + (!p8 && (p9 || p2)) as u32;

    let n1 = (p9 || p2) as u32 + (p3 || p4) as u32 + (p5 || p6) as u32 + (p7 || p8) as u32;
    let n2 = (p2 || p3) as u32 + (p4 || p5) as u32 + (p6 || p7) as u32 + (p8 || p9) as u32;
    let n = n1.min(n2);

    let m = if subiteration == 0 {
        (p6 || p7 || !p9) && p8
    } else {
        (p2 || p3 || !p5) && p4
    };

    c == 1 && (2..=3).contains(&n) && !m
}

/// One skeleton segment: an ordered pixel chain between two graph nodes,
/// with the local radius sampled at every pixel
#[derive(Debug, Clone)]
pub struct RootSegment {
    pub start: usize,
    pub end: usize,
    pub pixels: Vec<(u32, u32)>,
    pub radii: Vec<f64>,
    pub length: f64,
}

impl RootSegment {
    fn new(start: usize, end: usize, pixels: Vec<(u32, u32)>, distance: &DistanceField) -> Self {
        let radii = pixels.iter().map(|&(x, y)| distance.radius(x, y)).collect();
        let length = polyline_length(&pixels);
        Self {
            start,
            end,
            pixels,
            radii,
            length,
        }
    }

    /// Radius sample at the given endpoint node
    pub fn radius_at(&self, node: usize) -> f64 {
        if self.start == node {
            self.radii.first().copied().unwrap_or(0.0)
        } else {
            self.radii.last().copied().unwrap_or(0.0)
        }
    }

    /// Radius one step into the segment from the given endpoint. Every
    /// segment incident to a node shares the node pixel itself, so this
    /// is the sample that tells segments at a junction apart.
    pub fn radius_near(&self, node: usize) -> f64 {
        if self.radii.len() < 2 {
            return self.radii.first().copied().unwrap_or(0.0);
        }
        if self.start == node {
            self.radii[1]
        } else {
            self.radii[self.radii.len() - 2]
        }
    }

    /// Length share attributed to each chain pixel: half the step toward
    /// each neighbor. The shares sum exactly to the segment length, so
    /// statistics accumulated per pixel partition the total length.
    pub fn attributed_lengths(&self) -> Vec<f64> {
        let n = self.pixels.len();
        let mut shares = vec![0.0; n];
        for i in 0..n.saturating_sub(1) {
            let step = step_length(self.pixels[i], self.pixels[i + 1]);
            shares[i] += step / 2.0;
            shares[i + 1] += step / 2.0;
        }
        shares
    }
}

/// Undirected graph over the thinned skeleton. Nodes are pixels of
/// degree other than two; segments are the chains between them.
#[derive(Debug, Clone)]
pub struct SkeletonGraph {
    pub width: u32,
    pub height: u32,
    pub nodes: Vec<(u32, u32)>,
    pub segments: Vec<RootSegment>,
}

impl SkeletonGraph {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.segments.is_empty()
    }

    pub fn node_degree(&self, node: usize) -> usize {
        self.segments
            .iter()
            .map(|s| (s.start == node) as usize + (s.end == node) as usize)
            .sum()
    }

    pub fn incident_segments(&self, node: usize) -> Vec<usize> {
        self.segments
            .iter()
            .enumerate()
            .filter(|(_, s)| s.start == node || s.end == node)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn tip_count(&self) -> usize {
        (0..self.nodes.len())
            .filter(|&n| self.node_degree(n) == 1)
            .count()
    }

    pub fn branch_count(&self) -> usize {
        (0..self.nodes.len())
            .filter(|&n| self.node_degree(n) >= 3)
            .count()
    }

    pub fn total_length(&self) -> f64 {
        self.segments.iter().map(|s| s.length).sum()
    }

    /// Rasterize the graph back to a binary image, segment chains and
    /// nodes included
    pub fn to_mask(&self) -> GrayImage {
        let mut mask = GrayImage::new(self.width, self.height);
        for segment in &self.segments {
            for &(x, y) in &segment.pixels {
                mask.put_pixel(x, y, Luma([FOREGROUND]));
            }
        }
        for &(x, y) in &self.nodes {
            mask.put_pixel(x, y, Luma([FOREGROUND]));
        }
        mask
    }
}

/// Skeletonization result: the radius field and the extracted graph
pub struct Skeleton {
    pub distance: DistanceField,
    pub graph: SkeletonGraph,
}

/// Thin the mask and extract its skeleton graph together with the
/// distance field used for diameter estimates
pub fn build(mask: &GrayImage, name: &str) -> Result<Skeleton> {
    if mask.pixels().all(|p| p[0] == 0) {
        return Err(RootMorphError::DegenerateSkeleton(format!(
            "no foreground pixels in {}",
            name
        )));
    }

    let distance = DistanceField::from_mask(mask);
    let thinned = thin_mask(mask);
    let graph = build_graph(&thinned, &distance);

    Ok(Skeleton { distance, graph })
}

fn build_graph(thinned: &GrayImage, distance: &DistanceField) -> SkeletonGraph {
    let (width, height) = thinned.dimensions();
    let w = width as usize;
    let grid: Vec<bool> = thinned.pixels().map(|p| p[0] > 0).collect();
    let index = |x: u32, y: u32| y as usize * w + x as usize;

    let neighbors = |x: u32, y: u32| -> Vec<(u32, u32)> {
        let mut out = Vec::new();
        for (dx, dy) in NEIGHBOR_OFFSETS {
            let nx = x as i32 + dx;
            let ny = y as i32 + dy;
            if nx >= 0 && ny >= 0 && (nx as u32) < width && (ny as u32) < height {
                let (nx, ny) = (nx as u32, ny as u32);
                if grid[index(nx, ny)] {
                    out.push((nx, ny));
                }
            }
        }
        out
    };

    // Nodes are skeleton pixels whose neighbor count differs from two
    let mut node_at: Vec<Option<usize>> = vec![None; grid.len()];
    let mut nodes: Vec<(u32, u32)> = Vec::new();
    for y in 0..height {
        for x in 0..width {
            if grid[index(x, y)] && neighbors(x, y).len() != 2 {
                node_at[index(x, y)] = Some(nodes.len());
                nodes.push((x, y));
            }
        }
    }

    let mut consumed = vec![false; grid.len()];
    let mut segments: Vec<RootSegment> = Vec::new();
    let mut direct_edges: HashSet<(usize, usize)> = HashSet::new();

    // Trace chains outward from every node
    for node_idx in 0..nodes.len() {
        let (nx, ny) = nodes[node_idx];

        for (sx, sy) in neighbors(nx, ny) {
            if let Some(other) = node_at[index(sx, sy)] {
                let key = (node_idx.min(other), node_idx.max(other));
                if direct_edges.insert(key) {
                    segments.push(RootSegment::new(
                        node_idx,
                        other,
                        vec![(nx, ny), (sx, sy)],
                        distance,
                    ));
                }
                continue;
            }

            if consumed[index(sx, sy)] {
                continue;
            }

            let mut chain = vec![(nx, ny)];
            let mut prev = (nx, ny);
            let mut cur = (sx, sy);

            loop {
                if let Some(end_idx) = node_at[index(cur.0, cur.1)] {
                    chain.push(cur);
                    if end_idx == node_idx {
                        // Chain looped back onto its own node; split it in
                        // the middle so the graph keeps no self loops
                        split_loop_chain(chain, node_idx, &mut nodes, &mut node_at, index, &mut segments, distance);
                    } else {
                        segments.push(RootSegment::new(node_idx, end_idx, chain, distance));
                    }
                    break;
                }

                consumed[index(cur.0, cur.1)] = true;
                chain.push(cur);

                match neighbors(cur.0, cur.1).into_iter().find(|&p| p != prev) {
                    Some(next) => {
                        prev = cur;
                        cur = next;
                    }
                    None => break,
                }
            }
        }
    }

    // Any skeleton pixel left untouched belongs to a closed ring of
    // degree-two pixels with no node on it
    for y in 0..height {
        for x in 0..width {
            if !grid[index(x, y)] || consumed[index(x, y)] || node_at[index(x, y)].is_some() {
                continue;
            }

            let start = (x, y);
            let mut cycle = vec![start];
            consumed[index(x, y)] = true;

            let mut prev = start;
            let mut cur = neighbors(x, y)[0];
            while cur != start {
                consumed[index(cur.0, cur.1)] = true;
                cycle.push(cur);
                let next = neighbors(cur.0, cur.1)
                    .into_iter()
                    .find(|&p| p != prev)
                    .unwrap_or(start);
                prev = cur;
                cur = next;
            }

            // Promote two pixels to nodes and split the ring in two
            let mid = cycle.len() / 2;
            let node_a = nodes.len();
            node_at[index(cycle[0].0, cycle[0].1)] = Some(node_a);
            nodes.push(cycle[0]);
            let node_b = nodes.len();
            node_at[index(cycle[mid].0, cycle[mid].1)] = Some(node_b);
            nodes.push(cycle[mid]);

            let mut first_half: Vec<(u32, u32)> = cycle[..=mid].to_vec();
            let mut second_half: Vec<(u32, u32)> = cycle[mid..].to_vec();
            second_half.push(cycle[0]);

            segments.push(RootSegment::new(
                node_a,
                node_b,
                std::mem::take(&mut first_half),
                distance,
            ));
            segments.push(RootSegment::new(
                node_b,
                node_a,
                std::mem::take(&mut second_half),
                distance,
            ));
        }
    }

    SkeletonGraph {
        width,
        height,
        nodes,
        segments,
    }
}

#[allow(clippy::too_many_arguments)]
fn split_loop_chain<F>(
    chain: Vec<(u32, u32)>,
    node_idx: usize,
    nodes: &mut Vec<(u32, u32)>,
    node_at: &mut [Option<usize>],
    index: F,
    segments: &mut Vec<RootSegment>,
    distance: &DistanceField,
) where
    F: Fn(u32, u32) -> usize,
{
    if chain.len() < 4 {
        // Too short to carry two distinct segments; drop it
        return;
    }

    let mid = chain.len() / 2;
    let (mx, my) = chain[mid];
    let mid_node = nodes.len();
    node_at[index(mx, my)] = Some(mid_node);
    nodes.push((mx, my));

    segments.push(RootSegment::new(
        node_idx,
        mid_node,
        chain[..=mid].to_vec(),
        distance,
    ));
    segments.push(RootSegment::new(
        mid_node,
        node_idx,
        chain[mid..].to_vec(),
        distance,
    ));
}

#[inline]
pub fn step_length(a: (u32, u32), b: (u32, u32)) -> f64 {
    let dx = (a.0 as i64 - b.0 as i64).abs();
    let dy = (a.1 as i64 - b.1 as i64).abs();
    if dx == 1 && dy == 1 {
        SQRT_2
    } else {
        1.0
    }
}

pub fn polyline_length(pixels: &[(u32, u32)]) -> f64 {
    pixels
        .windows(2)
        .map(|pair| step_length(pair[0], pair[1]))
        .sum()
}
