//! # Sailtrack
//!
//! GPS track cleaning and sailing event derivation for regatta tracking.
//!
//! This library takes noisy, irregularly-sampled GPS position reports from
//! sailing boats and turns them into a cleaned track plus derived events:
//!
//! - Smoothed positions via a recursive, speed-adaptive noise filter
//! - Velocity (knots) and heading from sliding-window estimation
//! - A reduced polyline via minimum-triangle-area elimination (points are
//!   flagged, never deleted)
//! - Detected maneuvers: tacks, jibes, mark roundings, penalty spins
//! - An inferred true wind direction per track
//! - Inferred course marks across all tracks of a race
//!
//! ## Features
//!
//! - **`parallel`** - Gather race maneuvers in parallel with rayon
//! - **`serde`** - Serde derives on the public data model
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use sailtrack::{MemoryStore, PipelineConfig, TrackId, TrackPoint};
//!
//! let store = MemoryStore::new();
//! let track = TrackId(1);
//!
//! // A short northbound track, one fix per second
//! let points: Vec<TrackPoint> = (0..10)
//!     .map(|i| TrackPoint::new(
//!         i,
//!         54.32 + i as f64 * 0.0001,
//!         10.15,
//!         4.0,
//!         Utc.timestamp_opt(1_700_000_000 + i as i64, 0).unwrap(),
//!     ))
//!     .collect();
//! store.insert_track(track, points);
//!
//! let processed = sailtrack::process_track(&store, track, &PipelineConfig::default()).unwrap();
//! assert_eq!(processed, 10);
//! ```

use chrono::{DateTime, Utc};

pub mod error;
pub mod geo_utils;

pub mod filter;
pub mod motion;
pub mod simplify;
pub mod maneuver;
pub mod wind;
pub mod marks;

pub mod storage;
pub mod pipeline;

pub use error::{Error, Result};
pub use filter::{FilterConfig, PositionFilter};
pub use motion::{MotionConfig, SpeedWindow};
pub use simplify::SimplifyConfig;
pub use maneuver::{ManeuverConfig, TurnDetector};
pub use wind::{StableRunExtractor, WindConfig};
pub use marks::MarkConfig;
pub use storage::{AdjustedPosition, MemoryStore, TrackStore, VelocityHeading};
pub use pipeline::{
    detect_course_marks, detect_maneuvers, infer_wind, process_track, simplify_track,
    BatchConfig, PipelineConfig,
};

// ============================================================================
// Core Types
// ============================================================================

/// Identifier of one continuous GPS recording session for a boat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrackId(pub u64);

/// Identifier of a race: a group of tracks recorded concurrently and
/// co-located, treated as participants in one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RaceId(pub u64);

/// A bare GPS coordinate, used by the geometry functions.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// Create a new coordinate.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Check that the coordinate is finite and inside the WGS84 range.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// One stored track point.
///
/// The raw fields (`latitude`, `longitude`, `accuracy`, `captured_at`) are
/// immutable once ingested. The remaining fields are derived by the pipeline
/// and written back through the storage collaborator: the position filter
/// fills `adjusted_latitude`/`adjusted_longitude`, the motion estimator fills
/// `velocity`/`heading` (the first point of a track has neither), and the
/// simplifier sets `simplified` on elided points. Simplification never
/// deletes points, so the full-resolution history stays retrievable.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrackPoint {
    pub id: u64,
    pub latitude: f64,
    pub longitude: f64,
    /// Reported GPS accuracy in meters. Values ≤ 0 are floored to 1.0 by
    /// the filter to avoid division by zero.
    pub accuracy: f64,
    pub captured_at: DateTime<Utc>,
    pub adjusted_latitude: Option<f64>,
    pub adjusted_longitude: Option<f64>,
    /// Smoothed speed in knots.
    pub velocity: Option<f64>,
    /// Heading in degrees, [0, 360).
    pub heading: Option<f64>,
    pub simplified: bool,
}

impl TrackPoint {
    /// Create a raw point with no derived attributes.
    pub fn new(id: u64, latitude: f64, longitude: f64, accuracy: f64, captured_at: DateTime<Utc>) -> Self {
        Self {
            id,
            latitude,
            longitude,
            accuracy,
            captured_at,
            adjusted_latitude: None,
            adjusted_longitude: None,
            velocity: None,
            heading: None,
            simplified: false,
        }
    }

    /// The best known position: the filter-adjusted coordinate when present,
    /// the raw measurement otherwise.
    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(
            self.adjusted_latitude.unwrap_or(self.latitude),
            self.adjusted_longitude.unwrap_or(self.longitude),
        )
    }

    /// Check that the raw measurement is usable: finite in-range coordinates
    /// and a finite accuracy.
    pub fn is_valid(&self) -> bool {
        GeoPoint::new(self.latitude, self.longitude).is_valid() && self.accuracy.is_finite()
    }
}

/// Kind of a detected turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ManeuverKind {
    /// Turn through the wind, bow-first.
    Tack,
    /// Turn away from the wind, stern-first.
    Jibe,
    /// Turn around a fixed course mark.
    Rounding,
    /// Full 360° self-inflicted turn, typically a racing penalty.
    PenaltySpin,
    Unknown,
}

impl ManeuverKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ManeuverKind::Tack => "tack",
            ManeuverKind::Jibe => "jibe",
            ManeuverKind::Rounding => "rounding",
            ManeuverKind::PenaltySpin => "penalty_spin",
            ManeuverKind::Unknown => "unknown",
        }
    }
}

/// One detected turn event.
///
/// Never mutated after creation within a run; re-running detection for a
/// track deletes and replaces all of its maneuvers.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Maneuver {
    pub track_id: TrackId,
    /// Signed sum of consecutive heading deltas across the turn, in degrees.
    /// Magnitude up to 720.
    pub cumulative_heading_change: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub occurred_at: DateTime<Utc>,
    pub kind: ManeuverKind,
    /// Detection confidence in [0, 1]; longer, sharper turns score higher.
    pub confidence: f64,
}

/// Inferred true wind direction for a track, degrees 0–359 rounded to 5°.
/// At most one per track; overwritten on re-run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WindEstimate {
    pub track_id: TrackId,
    pub degrees: u16,
}

/// Which way the fleet turned around an inferred mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MarkKind {
    /// Majority of contributing turns went to port (negative heading change).
    PortRounding,
    /// Majority of contributing turns went to starboard (positive heading change).
    StarboardRounding,
}

/// A course mark inferred from clustered maneuvers across a race's tracks.
/// All marks for a race are regenerated wholesale on each detection run.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CourseMark {
    pub race_id: RaceId,
    pub latitude: f64,
    pub longitude: f64,
    pub confidence: f64,
    pub kind: MarkKind,
}
