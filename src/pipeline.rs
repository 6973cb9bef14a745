//! # Pipeline Entry Points
//!
//! The five operations the scheduling collaborator invokes after a track
//! ends, in their natural order:
//!
//! 1. [`process_track`]: position filtering plus velocity/heading
//! 2. [`simplify_track`]: polyline reduction (flags points, keeps all)
//! 3. [`detect_maneuvers`]: turn events, optionally wind-aware
//! 4. [`infer_wind`]: true wind direction from stable heading runs
//! 5. [`detect_course_marks`]: race-wide mark clustering
//!
//! Every entry point is idempotent: derived attributes are upserts,
//! maneuvers and marks are full replaces, so re-invoking after a partial
//! failure is always safe. Each runs synchronously and streams the track in
//! bounded batches; the batch fetch/write calls are the only suspension
//! points, and a storage failure aborts the remaining run for that
//! track/race. Algorithm state (filter, speed window, turn buffer, run
//! extractor) is threaded across batch boundaries explicitly, so splitting
//! a track into more or fewer batches never changes the output.

use crate::error::{Error, Result};
use crate::filter::PositionFilter;
use crate::geo_utils::haversine_distance;
use crate::maneuver::TurnDetector;
use crate::marks::detect_marks;
use crate::motion::{heading_between, SpeedWindow};
use crate::simplify::simplify_chunk;
use crate::storage::{AdjustedPosition, TrackStore, VelocityHeading};
use crate::wind::{estimate_from_runs, StableRunExtractor};
use crate::{
    FilterConfig, GeoPoint, Maneuver, ManeuverConfig, MarkConfig, MotionConfig, RaceId,
    SimplifyConfig, TrackId, WindConfig, WindEstimate,
};
use log::{debug, info, warn};

/// Configuration for all pipeline stages.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub batching: BatchConfig,
    pub filter: FilterConfig,
    pub motion: MotionConfig,
    pub simplify: SimplifyConfig,
    pub maneuver: ManeuverConfig,
    pub wind: WindConfig,
    pub marks: MarkConfig,
}

/// Streaming batch size.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Points fetched per storage round trip. Default: 200.
    pub batch_size: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { batch_size: 200 }
    }
}

/// Run the position filter and the speed/heading estimator over a track,
/// writing adjusted positions and velocity/heading back per batch.
///
/// Invalid points (non-finite coordinates or accuracy) are logged and
/// skipped; they receive no derived attributes. Returns the number of
/// points processed.
pub fn process_track<S: TrackStore>(
    store: &S,
    track: TrackId,
    config: &PipelineConfig,
) -> Result<usize> {
    let started = std::time::Instant::now();
    let batch_size = config.batching.batch_size.max(1);
    let mut filter = PositionFilter::new();
    let mut window = SpeedWindow::new(config.motion.window_size);
    let mut prev: Option<(GeoPoint, chrono::DateTime<chrono::Utc>)> = None;

    let mut processed = 0usize;
    let mut skipped = 0usize;
    let mut offset = 0usize;

    loop {
        let batch = store.fetch_points(track, offset, batch_size)?;
        if batch.is_empty() {
            break;
        }

        let mut adjusted = Vec::with_capacity(batch.len());
        let mut motion = Vec::with_capacity(batch.len());

        for point in &batch {
            // Faster recent motion means more trust in new measurements
            let process_noise = window.speed_mps().max(config.filter.base_process_noise);

            let (lat, lon) = match filter.update(point, process_noise, &config.filter) {
                Ok(position) => position,
                Err(Error::InvalidPoint { id, reason }) => {
                    warn!("track {}: skipping point {}: {}", track.0, id, reason);
                    skipped += 1;
                    continue;
                }
                Err(other) => return Err(other),
            };
            adjusted.push(AdjustedPosition { id: point.id, latitude: lat, longitude: lon });

            let current = GeoPoint::new(lat, lon);
            if let Some((prev_pos, prev_at)) = prev {
                let elapsed = (point.captured_at - prev_at).num_milliseconds() as f64 / 1000.0;
                let distance = haversine_distance(&prev_pos, &current);
                window.push(distance, elapsed);
                motion.push(VelocityHeading {
                    id: point.id,
                    velocity: window.speed_knots(),
                    heading: heading_between(&prev_pos, &current),
                });
            }
            prev = Some((current, point.captured_at));
            processed += 1;
        }

        store.upsert_adjusted_positions(track, &adjusted)?;
        store.upsert_velocity_heading(track, &motion)?;
        debug!("track {}: processed batch of {} at offset {}", track.0, batch.len(), offset);

        if batch.len() < batch_size {
            break;
        }
        offset += batch.len();
    }

    info!(
        "track {}: filtered {} points ({} skipped as invalid) in {:?}",
        track.0,
        processed,
        skipped,
        started.elapsed()
    );
    Ok(processed)
}

/// Reduce a track's polyline by flagging low-area points, in overlapping
/// chunks so memory stays bounded on long tracks.
///
/// The removal budget is the configured fraction of the track's total point
/// count, minus points already flagged by earlier runs; that makes the
/// operation converge rather than shave another fraction off on every
/// re-invocation. Returns the number of points flagged by this run.
pub fn simplify_track<S: TrackStore>(
    store: &S,
    track: TrackId,
    config: &PipelineConfig,
) -> Result<usize> {
    let batch_size = config.batching.batch_size.max(1);
    let chunk_size = config.simplify.chunk_size.max(3);
    let overlap = config.simplify.chunk_overlap.max(1).min(chunk_size - 1);

    let total = store.point_count(track)?;
    if total < 3 {
        debug!("track {}: {} points, nothing to simplify", track.0, total);
        return Ok(0);
    }

    // First pass: how much of the budget earlier runs already spent
    let global_budget = (total as f64 * config.simplify.target_fraction).floor() as usize;
    let mut already_flagged = 0usize;
    let mut offset = 0usize;
    loop {
        let batch = store.fetch_points(track, offset, batch_size)?;
        if batch.is_empty() {
            break;
        }
        already_flagged += batch.iter().filter(|p| p.simplified).count();
        if batch.len() < batch_size {
            break;
        }
        offset += batch.len();
    }

    let mut budget = global_budget.saturating_sub(already_flagged);
    if budget == 0 {
        info!("track {}: simplification budget already spent", track.0);
        return Ok(0);
    }

    // Second pass: stream retained points into overlapping chunks
    let mut carry: Vec<(u64, GeoPoint)> = Vec::with_capacity(chunk_size);
    let mut flagged = 0usize;
    let mut offset = 0usize;
    loop {
        if budget == 0 {
            break;
        }
        let batch = store.fetch_points(track, offset, batch_size)?;
        let at_end = batch.len() < batch_size;

        for point in &batch {
            if point.simplified {
                continue;
            }
            carry.push((point.id, point.position()));
            if carry.len() == chunk_size && budget > 0 {
                let removed = run_chunk(store, track, &carry, config, &mut budget)?;
                flagged += removed.len();
                // Seed the next chunk with the trailing retained points
                let mut tail: Vec<(u64, GeoPoint)> = carry
                    .iter()
                    .filter(|(id, _)| !removed.contains(id))
                    .rev()
                    .take(overlap)
                    .copied()
                    .collect();
                tail.reverse();
                carry = tail;
            }
        }

        if at_end {
            break;
        }
        offset += batch.len();
    }

    if carry.len() >= 3 && budget > 0 {
        let removed = run_chunk(store, track, &carry, config, &mut budget)?;
        flagged += removed.len();
    }

    info!(
        "track {}: flagged {} of {} points as simplified",
        track.0, flagged, total
    );
    Ok(flagged)
}

fn run_chunk<S: TrackStore>(
    store: &S,
    track: TrackId,
    chunk: &[(u64, GeoPoint)],
    config: &PipelineConfig,
    budget: &mut usize,
) -> Result<Vec<u64>> {
    let proportional = (chunk.len() as f64 * config.simplify.target_fraction).floor() as usize;
    let removals = proportional.min(*budget);
    let removed = simplify_chunk(chunk, removals);
    if !removed.is_empty() {
        store.mark_simplified(track, &removed)?;
        *budget -= removed.len();
    }
    Ok(removed)
}

/// Scan a processed track's heading stream for maneuvers and replace the
/// track's stored maneuver set wholesale.
///
/// `wind_degrees_hint` enables wind-aware tack/jibe classification; without
/// it the detector falls back to the numeric thresholds, so the same turn
/// may classify differently before and after wind inference has run.
/// Returns the number of maneuvers detected.
pub fn detect_maneuvers<S: TrackStore>(
    store: &S,
    track: TrackId,
    wind_degrees_hint: Option<u16>,
    config: &PipelineConfig,
) -> Result<usize> {
    let batch_size = config.batching.batch_size.max(1);
    let mut detector = TurnDetector::new(
        track,
        wind_degrees_hint.map(f64::from),
        config.maneuver.clone(),
    );
    let mut maneuvers: Vec<Maneuver> = Vec::new();

    let mut offset = 0usize;
    loop {
        let batch = store.fetch_points(track, offset, batch_size)?;
        if batch.is_empty() {
            break;
        }
        for point in &batch {
            if let Some(m) = detector.push(point) {
                maneuvers.push(m);
            }
        }
        if batch.len() < batch_size {
            break;
        }
        offset += batch.len();
    }
    if let Some(m) = detector.finish() {
        maneuvers.push(m);
    }

    let count = maneuvers.len();
    store.replace_maneuvers(track, maneuvers)?;
    info!(
        "track {}: detected {} maneuvers (wind hint: {:?})",
        track.0, count, wind_degrees_hint
    );
    Ok(count)
}

/// Infer the true wind direction from a processed track's headings and
/// store it (or clear it when no tack pair qualifies). Returns the
/// estimate.
pub fn infer_wind<S: TrackStore>(
    store: &S,
    track: TrackId,
    config: &PipelineConfig,
) -> Result<Option<WindEstimate>> {
    let batch_size = config.batching.batch_size.max(1);
    let mut extractor = StableRunExtractor::new(&config.wind);

    let mut offset = 0usize;
    loop {
        let batch = store.fetch_points(track, offset, batch_size)?;
        if batch.is_empty() {
            break;
        }
        for point in &batch {
            if let Some(heading) = point.heading {
                extractor.push(heading);
            }
        }
        if batch.len() < batch_size {
            break;
        }
        offset += batch.len();
    }

    let degrees = estimate_from_runs(&extractor.finish(), &config.wind);
    store.set_wind_estimate(track, degrees)?;
    match degrees {
        Some(d) => info!("track {}: inferred wind from {}°", track.0, d),
        None => info!("track {}: no wind estimate (no qualifying tack pair)", track.0),
    }
    Ok(degrees.map(|degrees| WindEstimate { track_id: track, degrees }))
}

/// Cluster sharp maneuvers across every track of a race into course marks
/// and replace the race's stored marks wholesale. Returns the number of
/// marks produced.
pub fn detect_course_marks<S: TrackStore>(
    store: &S,
    race: RaceId,
    config: &PipelineConfig,
) -> Result<usize> {
    let tracks = store.race_track_ids(race)?;

    #[cfg(feature = "parallel")]
    let gathered: Vec<Vec<Maneuver>> = {
        use rayon::prelude::*;
        tracks
            .par_iter()
            .map(|t| store.fetch_maneuvers(*t))
            .collect::<Result<_>>()?
    };

    #[cfg(not(feature = "parallel"))]
    let gathered: Vec<Vec<Maneuver>> = tracks
        .iter()
        .map(|t| store.fetch_maneuvers(*t))
        .collect::<Result<_>>()?;

    let maneuvers: Vec<Maneuver> = gathered.into_iter().flatten().collect();
    let marks = detect_marks(race, &maneuvers, tracks.len(), &config.marks);
    let count = marks.len();
    store.replace_course_marks(race, marks)?;
    info!(
        "race {}: {} course marks from {} maneuvers across {} tracks",
        race.0,
        count,
        maneuvers.len(),
        tracks.len()
    );
    Ok(count)
}
