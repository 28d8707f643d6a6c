// src/buckets.rs - Accumulation of skeleton length, area and volume per diameter range

use std::f64::consts::PI;

use crate::skeleton::SkeletonGraph;

/// Length, projected area, surface area and volume accumulated per
/// diameter range. N thresholds split the diameter axis into N + 1
/// buckets; an empty threshold list leaves one bucket holding everything.
#[derive(Debug, Clone)]
pub struct DiameterBuckets {
    pub thresholds: Vec<f64>,
    pub lengths: Vec<f64>,
    pub projected_areas: Vec<f64>,
    pub surface_areas: Vec<f64>,
    pub volumes: Vec<f64>,
}

impl DiameterBuckets {
    pub fn bucket_count(&self) -> usize {
        self.lengths.len()
    }

    pub fn total_length(&self) -> f64 {
        self.lengths.iter().sum()
    }

    pub fn total_projected_area(&self) -> f64 {
        self.projected_areas.iter().sum()
    }

    pub fn total_surface_area(&self) -> f64 {
        self.surface_areas.iter().sum()
    }

    pub fn total_volume(&self) -> f64 {
        self.volumes.iter().sum()
    }
}

/// Walk every skeleton pixel, attribute its share of the chain length
/// to the bucket its local diameter falls in, and accumulate the root
/// length, projected area, surface area and volume per bucket.
///
/// The local diameter of a pixel is twice its distance field value. A
/// pixel whose chain share is `s` contributes `s` to length, `s * d` to
/// projected area, `s * pi * d` to surface area and `s * pi * (d/2)^2`
/// to volume. Shares partition segment lengths exactly, so the bucket
/// sums reproduce the totals without drift.
pub fn bucket_by_diameter(graph: &SkeletonGraph, thresholds: &[f64]) -> DiameterBuckets {
    let count = thresholds.len() + 1;
    let mut buckets = DiameterBuckets {
        thresholds: thresholds.to_vec(),
        lengths: vec![0.0; count],
        projected_areas: vec![0.0; count],
        surface_areas: vec![0.0; count],
        volumes: vec![0.0; count],
    };

    for segment in &graph.segments {
        let shares = segment.attributed_lengths();
        for (&radius, &share) in segment.radii.iter().zip(shares.iter()) {
            let diameter = 2.0 * radius;
            let bucket = bucket_index(thresholds, diameter);
            buckets.lengths[bucket] += share;
            buckets.projected_areas[bucket] += share * diameter;
            buckets.surface_areas[bucket] += share * PI * diameter;
            buckets.volumes[bucket] += share * PI * radius * radius;
        }
    }

    buckets
}

/// Bucket k holds diameters in [t[k-1], t[k]); the last bucket is
/// unbounded above. A diameter equal to a threshold lands above it.
pub fn bucket_index(thresholds: &[f64], diameter: f64) -> usize {
    thresholds.iter().filter(|&&t| diameter >= t).count()
}

/// Root length per rounded pixel diameter, indexed by diameter. Feeds
/// diameter histogram plots over the analysis result.
pub fn length_by_diameter(graph: &SkeletonGraph) -> Vec<f64> {
    let mut histogram: Vec<f64> = Vec::new();

    for segment in &graph.segments {
        let shares = segment.attributed_lengths();
        for (&radius, &share) in segment.radii.iter().zip(shares.iter()) {
            let diameter = (2.0 * radius).round() as usize;
            if histogram.len() <= diameter {
                histogram.resize(diameter + 1, 0.0);
            }
            histogram[diameter] += share;
        }
    }

    histogram
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skeleton::{RootSegment, SkeletonGraph};
    use assert_approx_eq::assert_approx_eq;

    fn uniform_chain(diameter: f64, pixel_count: u32) -> SkeletonGraph {
        let pixels: Vec<(u32, u32)> = (0..pixel_count).map(|x| (x, 0)).collect();
        let radii = vec![diameter / 2.0; pixel_count as usize];
        let length = (pixel_count - 1) as f64;
        SkeletonGraph {
            width: pixel_count,
            height: 1,
            nodes: vec![pixels[0], *pixels.last().unwrap()],
            segments: vec![RootSegment {
                start: 0,
                end: 1,
                pixels,
                radii,
                length,
            }],
        }
    }

    #[test]
    fn diameter_on_a_threshold_lands_in_the_upper_bucket() {
        let thresholds = [2.0, 5.0];
        assert_eq!(bucket_index(&thresholds, 1.9), 0);
        assert_eq!(bucket_index(&thresholds, 2.0), 1);
        assert_eq!(bucket_index(&thresholds, 4.9), 1);
        assert_eq!(bucket_index(&thresholds, 5.0), 2);
        assert_eq!(bucket_index(&thresholds, 50.0), 2);
    }

    #[test]
    fn no_thresholds_collapse_to_one_bucket() {
        let graph = uniform_chain(4.0, 11);
        let buckets = bucket_by_diameter(&graph, &[]);
        assert_eq!(buckets.bucket_count(), 1);
        assert_approx_eq!(buckets.lengths[0], 10.0, 1e-9);
    }

    #[test]
    fn uniform_chain_fills_a_single_bucket() {
        let graph = uniform_chain(4.0, 11);
        let buckets = bucket_by_diameter(&graph, &[2.0, 5.0]);

        assert_eq!(buckets.bucket_count(), 3);
        assert_approx_eq!(buckets.lengths[0], 0.0, 1e-12);
        assert_approx_eq!(buckets.lengths[1], 10.0, 1e-9);
        assert_approx_eq!(buckets.lengths[2], 0.0, 1e-12);

        assert_approx_eq!(buckets.projected_areas[1], 40.0, 1e-9);
        assert_approx_eq!(buckets.surface_areas[1], PI * 4.0 * 10.0, 1e-9);
        assert_approx_eq!(buckets.volumes[1], PI * 2.0 * 2.0 * 10.0, 1e-9);
    }

    #[test]
    fn bucket_sums_reproduce_totals() {
        let graph = uniform_chain(3.0, 21);
        let buckets = bucket_by_diameter(&graph, &[1.0, 2.5, 4.0]);
        assert_approx_eq!(buckets.total_length(), graph.total_length(), 1e-9);

        let single = bucket_by_diameter(&graph, &[]);
        assert_approx_eq!(single.total_volume(), buckets.total_volume(), 1e-9);
        assert_approx_eq!(single.total_surface_area(), buckets.total_surface_area(), 1e-9);
        assert_approx_eq!(
            single.total_projected_area(),
            buckets.total_projected_area(),
            1e-9
        );
    }

    #[test]
    fn histogram_indexes_by_rounded_diameter() {
        let graph = uniform_chain(4.0, 11);
        let histogram = length_by_diameter(&graph);
        assert_eq!(histogram.len(), 5);
        assert_approx_eq!(histogram[4], 10.0, 1e-9);
        assert_approx_eq!(histogram.iter().sum::<f64>(), 10.0, 1e-9);
    }
}
