// src/pruning.rs - Removal of short lateral stubs from the skeleton graph

use crate::skeleton::{RootSegment, SkeletonGraph};

/// Remove terminal segments shorter than `threshold` pixels whose radius
/// next to the junction does not exceed the thickest sibling segment
/// there. Runs to a fixed point; junction nodes left with exactly two
/// segments are contracted so the neighbors fuse into one chain.
///
/// Returns the number of segments removed.
pub fn prune(graph: &mut SkeletonGraph, threshold: f64) -> u32 {
    let initially_isolated: Vec<bool> = (0..graph.nodes.len())
        .map(|n| graph.node_degree(n) == 0)
        .collect();

    let mut removed = 0u32;
    while let Some(idx) = find_candidate(graph, threshold) {
        let segment = graph.segments.swap_remove(idx);
        removed += 1;

        for node in [segment.start, segment.end] {
            if graph.node_degree(node) == 2 {
                contract_node(graph, node);
            }
        }
    }

    if removed > 0 {
        drop_detached_nodes(graph, &initially_isolated);
    }

    removed
}

fn find_candidate(graph: &SkeletonGraph, threshold: f64) -> Option<usize> {
    for (idx, segment) in graph.segments.iter().enumerate() {
        let start_degree = graph.node_degree(segment.start);
        let end_degree = graph.node_degree(segment.end);

        // Terminal segment: tip on one side, junction on the other.
        // A segment with tips on both sides is a root of its own and
        // has no parent to compare against.
        let junction = if start_degree == 1 && end_degree >= 2 {
            segment.end
        } else if end_degree == 1 && start_degree >= 2 {
            segment.start
        } else {
            continue;
        };

        if segment.length >= threshold {
            continue;
        }

        let own = segment.radius_near(junction);
        let thickest_sibling = graph
            .incident_segments(junction)
            .into_iter()
            .filter(|&i| i != idx)
            .map(|i| graph.segments[i].radius_near(junction))
            .fold(0.0, f64::max);

        if own <= thickest_sibling {
            return Some(idx);
        }
    }

    None
}

/// Fuse the two segments meeting at a degree-two node into one chain
fn contract_node(graph: &mut SkeletonGraph, node: usize) {
    let incident = graph.incident_segments(node);
    debug_assert_eq!(incident.len(), 2);
    let (i, j) = (incident[0], incident[1]);

    let a = other_end(&graph.segments[i], node);
    let b = other_end(&graph.segments[j], node);
    if a == b {
        // Two halves of a ring; fusing them would loop a segment back
        // onto one node, so the junction stays
        return;
    }

    let (mut pixels, mut radii) = oriented_towards(&graph.segments[i], node);
    let (tail_pixels, tail_radii) = oriented_from(&graph.segments[j], node);
    pixels.extend(tail_pixels.into_iter().skip(1));
    radii.extend(tail_radii.into_iter().skip(1));

    let length = graph.segments[i].length + graph.segments[j].length;

    // Remove the higher index first so the lower one stays valid
    let (low, high) = (i.min(j), i.max(j));
    graph.segments.swap_remove(high);
    graph.segments.swap_remove(low);

    graph.segments.push(RootSegment {
        start: a,
        end: b,
        pixels,
        radii,
        length,
    });
}

/// Pixel chain and radii of a segment ordered so the given node comes last
fn oriented_towards(segment: &RootSegment, node: usize) -> (Vec<(u32, u32)>, Vec<f64>) {
    let mut pixels = segment.pixels.clone();
    let mut radii = segment.radii.clone();
    if segment.start == node {
        pixels.reverse();
        radii.reverse();
    }
    (pixels, radii)
}

/// Pixel chain and radii of a segment ordered so the given node comes first
fn oriented_from(segment: &RootSegment, node: usize) -> (Vec<(u32, u32)>, Vec<f64>) {
    let mut pixels = segment.pixels.clone();
    let mut radii = segment.radii.clone();
    if segment.end == node {
        pixels.reverse();
        radii.reverse();
    }
    (pixels, radii)
}

fn other_end(segment: &RootSegment, node: usize) -> usize {
    if segment.start == node {
        segment.end
    } else {
        segment.start
    }
}

/// Drop nodes that pruning left without any segment. Nodes that were
/// already isolated before pruning are real skeleton content and stay.
fn drop_detached_nodes(graph: &mut SkeletonGraph, initially_isolated: &[bool]) {
    let keep: Vec<bool> = (0..graph.nodes.len())
        .map(|n| graph.node_degree(n) > 0 || initially_isolated[n])
        .collect();

    let mut remap = vec![usize::MAX; graph.nodes.len()];
    let mut next = 0usize;
    for (old, &kept) in keep.iter().enumerate() {
        if kept {
            remap[old] = next;
            next += 1;
        }
    }

    let mut nodes = Vec::with_capacity(next);
    for (old, &position) in graph.nodes.iter().enumerate() {
        if keep[old] {
            nodes.push(position);
        }
    }
    graph.nodes = nodes;

    for segment in &mut graph.segments {
        segment.start = remap[segment.start];
        segment.end = remap[segment.end];
    }
}
