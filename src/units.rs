// src/units.rs - Scaling of measured features from pixels to physical units

use crate::features::FeatureVector;

/// Scale every dimensioned feature by the pixel-to-unit factor.
///
/// Lengths scale by the factor, areas by its square, volumes by its
/// cube, and the branching frequency by its inverse. Counts, ratios,
/// angles and the computation time carry no dimension and pass through.
/// NaN entries stay NaN, so unmeasured rows survive conversion.
pub fn apply_factor(features: &mut FeatureVector, factor: f64) {
    let area = factor * factor;
    let volume = area * factor;

    features.total_length *= factor;
    features.depth *= factor;
    features.max_width *= factor;
    features.average_diameter *= factor;
    features.median_diameter *= factor;
    features.maximum_diameter *= factor;
    features.perimeter *= factor;

    features.network_area *= area;
    features.convex_area *= area;
    features.lower_root_area *= area;
    features.surface_area *= area;
    features.average_hole_size *= area;

    features.volume *= volume;

    features.branching_frequency /= factor;

    for v in &mut features.bucket_lengths {
        *v *= factor;
    }
    for v in &mut features.bucket_projected_areas {
        *v *= area;
    }
    for v in &mut features.bucket_surface_areas {
        *v *= area;
    }
    for v in &mut features.bucket_volumes {
        *v *= volume;
    }
}
