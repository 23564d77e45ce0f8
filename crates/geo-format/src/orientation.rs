//! Ring orientation and containment.

use crate::geojson::{Position, Ring};

/// Signed area of a ring by the shoelace formula.
///
/// Positive for counter-clockwise rings, negative for clockwise ones. The
/// ring is expected to be closed (first position repeated at the end).
pub fn ring_signed_area(ring: &[Position]) -> f64 {
    let sum: f64 = ring
        .windows(2)
        .map(|w| w[0][0] * w[1][1] - w[1][0] * w[0][1])
        .sum();
    sum / 2.0
}

/// Orient polygon rings: exterior counter-clockwise, holes clockwise.
pub fn orient_polygon(rings: &[Ring]) -> Vec<Ring> {
    rings
        .iter()
        .enumerate()
        .map(|(index, ring)| {
            let should_be_ccw = index == 0;
            let is_ccw = ring_signed_area(ring) > 0.0;
            if should_be_ccw == is_ccw {
                ring.clone()
            } else {
                ring.iter().rev().copied().collect()
            }
        })
        .collect()
}

/// Even-odd point-in-ring test.
pub fn ring_contains(ring: &[Position], point: Position) -> bool {
    let [px, py] = point;
    let mut inside = false;
    let n = ring.len();
    if n < 3 {
        return false;
    }

    let mut j = n - 1;
    for i in 0..n {
        let [xi, yi] = ring[i];
        let [xj, yj] = ring[j];
        if (yi > py) != (yj > py) && px < (xj - xi) * (py - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}
