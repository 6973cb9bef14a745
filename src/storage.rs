//! # Storage Collaborator
//!
//! The pipeline consumes ordered point batches and writes derived
//! attributes back through the narrow [`TrackStore`] trait. Everything the
//! trait exposes is either an idempotent upsert or a full replace, so any
//! aborted run can be retried from scratch without leaving a partial
//! maneuver set or stale marks behind.
//!
//! [`MemoryStore`] implements the trait in memory for tests and embedding.
//! A real deployment backs the trait with its database and wraps
//! [`TrackStore::replace_maneuvers`] / [`TrackStore::replace_course_marks`]
//! in a transaction (delete-then-insert, atomic on success).

use crate::error::Result;
use crate::{CourseMark, Maneuver, RaceId, TrackId, TrackPoint};
use std::collections::HashMap;
use std::sync::RwLock;

/// One adjusted-position write-back.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AdjustedPosition {
    pub id: u64,
    pub latitude: f64,
    pub longitude: f64,
}

/// One velocity/heading write-back.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VelocityHeading {
    pub id: u64,
    /// Knots.
    pub velocity: f64,
    /// Degrees [0, 360).
    pub heading: f64,
}

/// Narrow interface to the persistence layer.
///
/// `fetch_points` batches are ordered by capture time ascending, and a
/// fetch sequence is restartable per invocation (offset 0 again), not
/// resumable mid-stream. Implementations must be `Sync` so independent
/// tracks can be processed concurrently; a single track or race is still
/// never processed by two runs at once.
pub trait TrackStore: Sync {
    /// Total number of points stored for a track.
    fn point_count(&self, track: TrackId) -> Result<usize>;

    /// Fetch one batch of points, ordered by capture time ascending.
    fn fetch_points(&self, track: TrackId, offset: usize, limit: usize) -> Result<Vec<TrackPoint>>;

    /// Upsert filter-adjusted positions.
    fn upsert_adjusted_positions(&self, track: TrackId, updates: &[AdjustedPosition]) -> Result<()>;

    /// Upsert derived velocity/heading.
    fn upsert_velocity_heading(&self, track: TrackId, updates: &[VelocityHeading]) -> Result<()>;

    /// Flag points as elided by the simplifier. Never deletes.
    fn mark_simplified(&self, track: TrackId, ids: &[u64]) -> Result<()>;

    /// Replace all maneuvers for a track. Delete-then-insert, expected
    /// atomic in real implementations.
    fn replace_maneuvers(&self, track: TrackId, maneuvers: Vec<Maneuver>) -> Result<()>;

    /// Set or clear the wind estimate for a track (degrees 0–359).
    fn set_wind_estimate(&self, track: TrackId, degrees: Option<u16>) -> Result<()>;

    /// All maneuvers currently stored for a track.
    fn fetch_maneuvers(&self, track: TrackId) -> Result<Vec<Maneuver>>;

    /// The tracks participating in a race.
    fn race_track_ids(&self, race: RaceId) -> Result<Vec<TrackId>>;

    /// Replace all course marks for a race. Delete-then-insert, expected
    /// atomic in real implementations.
    fn replace_course_marks(&self, race: RaceId, marks: Vec<CourseMark>) -> Result<()>;
}

#[derive(Debug, Default)]
struct MemoryStoreInner {
    points: HashMap<TrackId, Vec<TrackPoint>>,
    maneuvers: HashMap<TrackId, Vec<Maneuver>>,
    wind: HashMap<TrackId, Option<u16>>,
    races: HashMap<RaceId, Vec<TrackId>>,
    marks: HashMap<RaceId, Vec<CourseMark>>,
}

/// In-memory [`TrackStore`] for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a track's points, sorted by capture time.
    pub fn insert_track(&self, track: TrackId, mut points: Vec<TrackPoint>) {
        points.sort_by_key(|p| p.captured_at);
        self.inner.write().unwrap().points.insert(track, points);
    }

    /// Register the tracks participating in a race.
    pub fn insert_race(&self, race: RaceId, tracks: Vec<TrackId>) {
        self.inner.write().unwrap().races.insert(race, tracks);
    }

    /// Snapshot of a track's points, derived attributes included.
    pub fn points(&self, track: TrackId) -> Vec<TrackPoint> {
        self.inner.read().unwrap().points.get(&track).cloned().unwrap_or_default()
    }

    /// Snapshot of a track's maneuvers.
    pub fn maneuvers(&self, track: TrackId) -> Vec<Maneuver> {
        self.inner.read().unwrap().maneuvers.get(&track).cloned().unwrap_or_default()
    }

    /// The stored wind estimate, if any run has set one.
    pub fn wind_estimate(&self, track: TrackId) -> Option<u16> {
        self.inner.read().unwrap().wind.get(&track).copied().flatten()
    }

    /// Snapshot of a race's course marks.
    pub fn course_marks(&self, race: RaceId) -> Vec<CourseMark> {
        self.inner.read().unwrap().marks.get(&race).cloned().unwrap_or_default()
    }
}

impl TrackStore for MemoryStore {
    fn point_count(&self, track: TrackId) -> Result<usize> {
        Ok(self.inner.read().unwrap().points.get(&track).map_or(0, Vec::len))
    }

    fn fetch_points(&self, track: TrackId, offset: usize, limit: usize) -> Result<Vec<TrackPoint>> {
        let inner = self.inner.read().unwrap();
        let Some(points) = inner.points.get(&track) else {
            return Ok(Vec::new());
        };
        Ok(points.iter().skip(offset).take(limit).cloned().collect())
    }

    fn upsert_adjusted_positions(&self, track: TrackId, updates: &[AdjustedPosition]) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        if let Some(points) = inner.points.get_mut(&track) {
            for update in updates {
                if let Some(p) = points.iter_mut().find(|p| p.id == update.id) {
                    p.adjusted_latitude = Some(update.latitude);
                    p.adjusted_longitude = Some(update.longitude);
                }
            }
        }
        Ok(())
    }

    fn upsert_velocity_heading(&self, track: TrackId, updates: &[VelocityHeading]) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        if let Some(points) = inner.points.get_mut(&track) {
            for update in updates {
                if let Some(p) = points.iter_mut().find(|p| p.id == update.id) {
                    p.velocity = Some(update.velocity);
                    p.heading = Some(update.heading);
                }
            }
        }
        Ok(())
    }

    fn mark_simplified(&self, track: TrackId, ids: &[u64]) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        if let Some(points) = inner.points.get_mut(&track) {
            for id in ids {
                if let Some(p) = points.iter_mut().find(|p| p.id == *id) {
                    p.simplified = true;
                }
            }
        }
        Ok(())
    }

    fn replace_maneuvers(&self, track: TrackId, maneuvers: Vec<Maneuver>) -> Result<()> {
        self.inner.write().unwrap().maneuvers.insert(track, maneuvers);
        Ok(())
    }

    fn set_wind_estimate(&self, track: TrackId, degrees: Option<u16>) -> Result<()> {
        self.inner.write().unwrap().wind.insert(track, degrees);
        Ok(())
    }

    fn fetch_maneuvers(&self, track: TrackId) -> Result<Vec<Maneuver>> {
        Ok(self.inner.read().unwrap().maneuvers.get(&track).cloned().unwrap_or_default())
    }

    fn race_track_ids(&self, race: RaceId) -> Result<Vec<TrackId>> {
        Ok(self.inner.read().unwrap().races.get(&race).cloned().unwrap_or_default())
    }

    fn replace_course_marks(&self, race: RaceId, marks: Vec<CourseMark>) -> Result<()> {
        self.inner.write().unwrap().marks.insert(race, marks);
        Ok(())
    }
}
