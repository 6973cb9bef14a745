//! # Path Simplifier
//!
//! Point-count reduction by minimum-triangle-area elimination.
//!
//! Each interior point caches the area of the triangle it forms with its
//! current neighbors. The point whose removal introduces the least
//! cross-track area is unlinked, its former neighbors' areas are
//! recalculated, and the scan repeats until the removal budget is spent.
//! Greedy and order-dependent: ties go to the first minimum in scan order.
//!
//! The mutable doubly linked list is an arena of nodes addressed by index
//! with explicit `prev`/`next` fields, which keeps unlinking and neighbor
//! recalculation O(1) without ownership cycles.
//!
//! Long tracks are processed in overlapping chunks (see
//! [`pipeline::simplify_track`](crate::pipeline::simplify_track)) so memory
//! stays bounded; the overlap gives area recalculation at chunk boundaries
//! correct neighbor context, and a running total keeps the chunks from
//! overshooting the global removal budget. Simplified points are flagged,
//! never deleted.

use crate::GeoPoint;

/// Configuration for path simplification.
#[derive(Debug, Clone)]
pub struct SimplifyConfig {
    /// Fraction of the track's points to remove overall. Default: 0.4.
    pub target_fraction: f64,
    /// Points per chunk. Default: 256.
    pub chunk_size: usize,
    /// Points shared between consecutive chunks. Default: 2.
    pub chunk_overlap: usize,
}

impl Default for SimplifyConfig {
    fn default() -> Self {
        Self {
            target_fraction: 0.4,
            chunk_size: 256,
            chunk_overlap: 2,
        }
    }
}

/// Arena node of the linked point sequence.
#[derive(Debug, Clone)]
struct Node {
    id: u64,
    point: GeoPoint,
    prev: Option<usize>,
    next: Option<usize>,
    area: f64,
    removed: bool,
}

/// Area of the triangle spanned by three coordinates, in squared degrees.
///
/// Degrees are fine here: the comparison is relative and chunks are small
/// enough that the latitude distortion is uniform across candidates.
#[inline]
fn triangle_area(p1: &GeoPoint, p2: &GeoPoint, p3: &GeoPoint) -> f64 {
    ((p2.longitude - p1.longitude) * (p3.latitude - p1.latitude)
        - (p3.longitude - p1.longitude) * (p2.latitude - p1.latitude))
        .abs()
        / 2.0
}

fn recompute_area(nodes: &mut Vec<Node>, idx: usize) {
    let (prev, next) = (nodes[idx].prev, nodes[idx].next);
    nodes[idx].area = match (prev, next) {
        (Some(p), Some(n)) => triangle_area(&nodes[p].point, &nodes[idx].point, &nodes[n].point),
        // Endpoints are never removal candidates
        _ => f64::INFINITY,
    };
}

/// Simplify one chunk of the track, removing up to `removals` interior
/// points. Returns the ids of the removed points.
///
/// The chunk's two endpoints are always retained, and elimination stops
/// early once fewer than 3 points remain linked.
pub fn simplify_chunk(points: &[(u64, GeoPoint)], removals: usize) -> Vec<u64> {
    if points.len() < 3 || removals == 0 {
        return Vec::new();
    }

    let last = points.len() - 1;
    let mut nodes: Vec<Node> = points
        .iter()
        .enumerate()
        .map(|(i, (id, point))| Node {
            id: *id,
            point: *point,
            prev: if i == 0 { None } else { Some(i - 1) },
            next: if i == last { None } else { Some(i + 1) },
            area: 0.0,
            removed: false,
        })
        .collect();

    for i in 0..nodes.len() {
        recompute_area(&mut nodes, i);
    }

    let mut remaining = points.len();
    let mut removed_ids = Vec::with_capacity(removals.min(points.len().saturating_sub(2)));

    for _ in 0..removals {
        if remaining < 3 {
            break;
        }

        // First minimum in scan order wins ties
        let mut min_idx = None;
        let mut min_area = f64::INFINITY;
        for (i, node) in nodes.iter().enumerate() {
            if !node.removed && node.area < min_area {
                min_area = node.area;
                min_idx = Some(i);
            }
        }

        let Some(idx) = min_idx else { break };

        // Unlink; the neighbors become mutually adjacent
        let prev = nodes[idx].prev;
        let next = nodes[idx].next;
        if let Some(p) = prev {
            nodes[p].next = next;
        }
        if let Some(n) = next {
            nodes[n].prev = prev;
        }
        nodes[idx].removed = true;
        removed_ids.push(nodes[idx].id);
        remaining -= 1;

        if let Some(p) = prev {
            recompute_area(&mut nodes, p);
        }
        if let Some(n) = next {
            recompute_area(&mut nodes, n);
        }
    }

    removed_ids
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A zig-zag track with one collinear point (index 2 lies on the line
    /// between its neighbors, so its triangle area is zero).
    fn sample_points() -> Vec<(u64, GeoPoint)> {
        vec![
            (0, GeoPoint::new(54.3200, 10.1500)),
            (1, GeoPoint::new(54.3210, 10.1520)),
            (2, GeoPoint::new(54.3220, 10.1540)), // collinear with 1 and 3
            (3, GeoPoint::new(54.3230, 10.1560)),
            (4, GeoPoint::new(54.3260, 10.1530)),
            (5, GeoPoint::new(54.3270, 10.1600)),
        ]
    }

    #[test]
    fn test_zero_removals_unchanged() {
        let removed = simplify_chunk(&sample_points(), 0);
        assert!(removed.is_empty());
    }

    #[test]
    fn test_too_few_points() {
        let points = vec![
            (0, GeoPoint::new(54.32, 10.15)),
            (1, GeoPoint::new(54.33, 10.16)),
        ];
        assert!(simplify_chunk(&points, 5).is_empty());
    }

    #[test]
    fn test_collinear_point_removed_first() {
        let removed = simplify_chunk(&sample_points(), 1);
        assert_eq!(removed, vec![2]);
    }

    #[test]
    fn test_endpoints_never_removed() {
        let points = sample_points();
        let removed = simplify_chunk(&points, 100);
        assert!(!removed.contains(&0));
        assert!(!removed.contains(&5));
        // Floor of 3 linked points: both endpoints plus one interior
        assert_eq!(removed.len(), points.len() - 3);
    }

    #[test]
    fn test_removed_count_bounded_by_budget() {
        let removed = simplify_chunk(&sample_points(), 2);
        assert_eq!(removed.len(), 2);
    }

    #[test]
    fn test_neighbor_areas_recomputed_after_unlink() {
        // Straight line: every interior point is collinear, all areas zero.
        // After removing one, its neighbors must still look collinear with
        // their new adjacency, so the whole interior gets eliminated.
        let line: Vec<(u64, GeoPoint)> = (0..6)
            .map(|i| (i as u64, GeoPoint::new(54.32 + i as f64 * 0.001, 10.15)))
            .collect();
        let removed = simplify_chunk(&line, 100);
        assert_eq!(removed.len(), 3);
        assert!(!removed.contains(&0));
        assert!(!removed.contains(&5));
    }

    #[test]
    fn test_tie_broken_by_scan_order() {
        // Straight line again: all interior areas are exactly 0.0, so the
        // first interior point in scan order goes first.
        let line: Vec<(u64, GeoPoint)> = (0..5)
            .map(|i| (10 + i as u64, GeoPoint::new(54.32 + i as f64 * 0.001, 10.15)))
            .collect();
        let removed = simplify_chunk(&line, 1);
        assert_eq!(removed, vec![11]);
    }

    #[test]
    fn test_deterministic() {
        let a = simplify_chunk(&sample_points(), 3);
        let b = simplify_chunk(&sample_points(), 3);
        assert_eq!(a, b);
    }
}
