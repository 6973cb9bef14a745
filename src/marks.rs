//! # Course Mark Detection
//!
//! Infers course mark locations for a race by spatially clustering sharp
//! maneuvers across all of its tracks. A mark is where many boats turn hard
//! in the same spot; a single boat turning somewhere is just a boat turning.
//!
//! Greedy nearest-cluster assignment: each qualifying maneuver attaches to
//! the first existing cluster whose centroid lies within the cluster radius,
//! otherwise it starts a new cluster. Clusters backed by too small a share
//! of the race's tracks are discarded, which keeps one-off GPS noise from
//! becoming a "mark". Surviving clusters are offset a few meters inside the
//! turn and scored by track coverage and member confidence.
//!
//! All marks for a race are regenerated wholesale on each run: delete then
//! recreate, never an incremental merge. The clustering is not designed to
//! be incremental.

use crate::geo_utils::{haversine_distance, meters_to_degrees, meters_to_degrees_lat};
use crate::{CourseMark, GeoPoint, Maneuver, MarkKind, RaceId, TrackId};
use std::collections::HashSet;

/// Configuration for course mark detection.
#[derive(Debug, Clone)]
pub struct MarkConfig {
    /// Minimum |cumulative heading change| for a maneuver to count as a
    /// possible mark rounding, degrees. Default: 80.
    pub min_heading_change: f64,
    /// Maneuvers within this distance of a cluster centroid join it,
    /// meters. Default: 20.
    pub cluster_radius: f64,
    /// Minimum fraction of the race's tracks that must contribute to a
    /// cluster. Default: 0.3.
    pub min_track_coverage: f64,
    /// How far the mark is placed inside the turn, meters, split half in
    /// latitude and half in longitude. A heuristic constant, configurable
    /// rather than physically derived. Default: 5.
    pub turn_offset_meters: f64,
}

impl Default for MarkConfig {
    fn default() -> Self {
        Self {
            min_heading_change: 80.0,
            cluster_radius: 20.0,
            min_track_coverage: 0.3,
            turn_offset_meters: 5.0,
        }
    }
}

/// One spatial cluster of maneuvers, centroid kept as a running mean.
#[derive(Debug)]
struct ManeuverCluster {
    lat_sum: f64,
    lon_sum: f64,
    members: Vec<Maneuver>,
}

impl ManeuverCluster {
    fn new(m: &Maneuver) -> Self {
        Self {
            lat_sum: m.latitude,
            lon_sum: m.longitude,
            members: vec![m.clone()],
        }
    }

    fn push(&mut self, m: &Maneuver) {
        self.lat_sum += m.latitude;
        self.lon_sum += m.longitude;
        self.members.push(m.clone());
    }

    fn centroid(&self) -> GeoPoint {
        let n = self.members.len() as f64;
        GeoPoint::new(self.lat_sum / n, self.lon_sum / n)
    }

    fn distinct_tracks(&self) -> usize {
        self.members
            .iter()
            .map(|m| m.track_id)
            .collect::<HashSet<TrackId>>()
            .len()
    }

    /// Majority turn direction across members: +1 starboard, -1 port.
    /// A tie counts as starboard.
    fn majority_sign(&self) -> f64 {
        let sum: f64 = self
            .members
            .iter()
            .map(|m| m.cumulative_heading_change.signum())
            .sum();
        if sum < 0.0 {
            -1.0
        } else {
            1.0
        }
    }

    fn mean_confidence(&self) -> f64 {
        let sum: f64 = self.members.iter().map(|m| m.confidence).sum();
        sum / self.members.len() as f64
    }
}

/// Detect course marks from all maneuvers of a race.
///
/// `total_tracks` is the number of tracks in the race, which anchors the
/// coverage filter. Returns an empty vec when the race has no tracks or no
/// cluster reaches coverage; absence of marks is a valid result.
pub fn detect_marks(
    race_id: RaceId,
    maneuvers: &[Maneuver],
    total_tracks: usize,
    config: &MarkConfig,
) -> Vec<CourseMark> {
    if total_tracks == 0 {
        return Vec::new();
    }

    // Greedy assignment: first cluster within radius of its centroid wins
    let mut clusters: Vec<ManeuverCluster> = Vec::new();
    for m in maneuvers {
        if m.cumulative_heading_change.abs() < config.min_heading_change {
            continue;
        }
        let position = GeoPoint::new(m.latitude, m.longitude);
        match clusters
            .iter_mut()
            .find(|c| haversine_distance(&c.centroid(), &position) <= config.cluster_radius)
        {
            Some(cluster) => cluster.push(m),
            None => clusters.push(ManeuverCluster::new(m)),
        }
    }

    clusters
        .iter()
        .filter_map(|cluster| {
            let coverage = cluster.distinct_tracks() as f64 / total_tracks as f64;
            if coverage < config.min_track_coverage {
                return None;
            }

            let centroid = cluster.centroid();
            let sign = cluster.majority_sign();
            let half = config.turn_offset_meters / 2.0;
            let latitude = centroid.latitude + sign * meters_to_degrees_lat(half);
            let longitude = centroid.longitude + sign * meters_to_degrees(half, centroid.latitude);

            let confidence = (coverage + cluster.mean_confidence() / 2.0).min(1.0);
            let kind = if sign < 0.0 {
                MarkKind::PortRounding
            } else {
                MarkKind::StarboardRounding
            };

            Some(CourseMark {
                race_id,
                latitude,
                longitude,
                confidence,
                kind,
            })
        })
        .collect()
}
