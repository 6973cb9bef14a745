//! # Maneuver Detection
//!
//! Stateful scan over a track's heading stream producing discrete turn
//! events (tacks, jibes, mark roundings, penalty spins) without loading the
//! whole track into memory.
//!
//! The detector buffers recent points with their signed heading deltas,
//! trimmed to a rolling time window. A turn finalizes on either of two
//! hysteresis conditions: the heading delta's sign disagreed with the turn's
//! established direction twice in a row (genuine reversal), or the heading
//! held near-steady for three consecutive points (settled on a new course).
//! On finalize the cumulative change is classified, the turn's angular
//! midpoint is located by linear interpolation, and one [`Maneuver`] is
//! emitted. The buffer reseeds with only the last point so consecutive
//! turns stay contiguous.
//!
//! Classification priority is intentional and order-dependent: a full spin
//! is checked first, then wind-aware tack/jibe (only when a wind direction
//! is known), then the numeric fallbacks. The same turn can therefore
//! classify differently depending on whether a wind estimate existed when
//! detection ran; re-running detection after wind inference replaces the
//! maneuvers wholesale.

use crate::geo_utils::signed_angle_diff;
use crate::{Maneuver, ManeuverKind, TrackId, TrackPoint};
use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;

/// Configuration for the turn detector.
#[derive(Debug, Clone)]
pub struct ManeuverConfig {
    /// Rolling buffer window in seconds. Default: 15.
    pub window_secs: f64,
    /// Deltas below this magnitude count as "stable", degrees. Default: 5.
    pub stability_threshold: f64,
    /// Consecutive stable deltas that finalize a turn. Default: 3.
    pub stability_count: u32,
    /// Consecutive sign disagreements that finalize a turn. Default: 2.
    pub sign_flip_count: u32,
    /// Minimum |cumulative change| for a turn to be kept, degrees. Default: 30.
    pub min_total_change: f64,
    /// |cumulative change| at which a turn is a spin candidate. Default: 315.
    pub spin_threshold: f64,
    /// Maximum wall-clock duration for a spin; slower full circles are
    /// drift, not penalty turns. Default: 20 s.
    pub spin_max_duration_secs: f64,
    /// Half-window about head-to-wind a tack must cross on both sides.
    /// Default: 45.
    pub tack_wind_window: f64,
    /// Half-window about dead downwind a jibe must cross on both sides.
    /// Default: 30.
    pub jibe_wind_window: f64,
    /// Numeric fallback threshold for a rounding, degrees. Default: 120.
    pub rounding_threshold: f64,
    /// Numeric fallback threshold for a tack, degrees. Default: 70.
    pub tack_threshold: f64,
    /// Numeric fallback threshold for a jibe, degrees. Default: 30.
    pub jibe_threshold: f64,
}

impl Default for ManeuverConfig {
    fn default() -> Self {
        Self {
            window_secs: 15.0,
            stability_threshold: 5.0,
            stability_count: 3,
            sign_flip_count: 2,
            min_total_change: 30.0,
            spin_threshold: 315.0,
            spin_max_duration_secs: 20.0,
            tack_wind_window: 45.0,
            jibe_wind_window: 30.0,
            rounding_threshold: 120.0,
            tack_threshold: 70.0,
            jibe_threshold: 30.0,
        }
    }
}

/// One buffered point of the in-progress turn.
#[derive(Debug, Clone)]
struct TurnEntry {
    latitude: f64,
    longitude: f64,
    at: DateTime<Utc>,
    heading: f64,
    /// Signed heading delta from the previous point, (-180, 180].
    delta: f64,
    /// Running sum of deltas from the start of the buffer.
    cumulative: f64,
}

/// Sliding-window turn state machine. Create one per track run, feed points
/// (which must carry a heading) in capture order, and call
/// [`TurnDetector::finish`] at end of stream.
#[derive(Debug)]
pub struct TurnDetector {
    track_id: TrackId,
    wind_degrees: Option<f64>,
    config: ManeuverConfig,
    buffer: VecDeque<TurnEntry>,
    /// Established turn direction: +1 starboard, -1 port, 0 undecided.
    turn_sign: f64,
    sign_flips: u32,
    stable_count: u32,
}

impl TurnDetector {
    pub fn new(track_id: TrackId, wind_degrees: Option<f64>, config: ManeuverConfig) -> Self {
        Self {
            track_id,
            wind_degrees,
            config,
            buffer: VecDeque::new(),
            turn_sign: 0.0,
            sign_flips: 0,
            stable_count: 0,
        }
    }

    /// Feed one point. Returns a maneuver when this point finalized a
    /// qualifying turn. Points without a heading (the first of a track)
    /// are ignored.
    pub fn push(&mut self, point: &TrackPoint) -> Option<Maneuver> {
        let heading = point.heading?;
        let position = point.position();

        let Some(last) = self.buffer.back() else {
            self.seed(position.latitude, position.longitude, point.captured_at, heading);
            return None;
        };

        let delta = signed_angle_diff(last.heading, heading);
        let cumulative = last.cumulative + delta;
        self.buffer.push_back(TurnEntry {
            latitude: position.latitude,
            longitude: position.longitude,
            at: point.captured_at,
            heading,
            delta,
            cumulative,
        });
        self.trim_window(point.captured_at);

        // Hysteresis counters
        if delta != 0.0 {
            if self.turn_sign == 0.0 {
                self.turn_sign = delta.signum();
                self.sign_flips = 0;
            } else if delta.signum() != self.turn_sign {
                self.sign_flips += 1;
            } else {
                self.sign_flips = 0;
            }
        }
        if delta.abs() < self.config.stability_threshold {
            self.stable_count += 1;
        } else {
            self.stable_count = 0;
        }

        if self.sign_flips >= self.config.sign_flip_count
            || self.stable_count >= self.config.stability_count
        {
            return self.finalize();
        }
        None
    }

    /// Finalize any still-open turn at end of stream.
    pub fn finish(&mut self) -> Option<Maneuver> {
        if self.buffer.len() >= 2 {
            self.finalize()
        } else {
            None
        }
    }

    fn seed(&mut self, latitude: f64, longitude: f64, at: DateTime<Utc>, heading: f64) {
        self.buffer.clear();
        self.buffer.push_back(TurnEntry {
            latitude,
            longitude,
            at,
            heading,
            delta: 0.0,
            cumulative: 0.0,
        });
        self.turn_sign = 0.0;
        self.sign_flips = 0;
        self.stable_count = 0;
    }

    /// Drop entries older than the rolling window and rebase the cumulative
    /// sums so they start at the new front.
    fn trim_window(&mut self, now: DateTime<Utc>) {
        let window = Duration::milliseconds((self.config.window_secs * 1000.0) as i64);
        let cutoff = now - window;
        let mut trimmed = false;
        while self.buffer.len() > 1 && self.buffer.front().map_or(false, |e| e.at < cutoff) {
            self.buffer.pop_front();
            trimmed = true;
        }
        if trimmed {
            let mut sum = 0.0;
            let mut first = true;
            for entry in self.buffer.iter_mut() {
                if first {
                    // The new front anchors the turn; its own delta came
                    // from a point that is no longer buffered
                    entry.delta = 0.0;
                    entry.cumulative = 0.0;
                    first = false;
                } else {
                    sum += entry.delta;
                    entry.cumulative = sum;
                }
            }
        }
    }

    fn finalize(&mut self) -> Option<Maneuver> {
        let total = self.buffer.back().map_or(0.0, |e| e.cumulative);
        let size = self.buffer.len();
        let maneuver = if total.abs() >= self.config.min_total_change {
            self.classify(total).map(|kind| {
                let (latitude, longitude, occurred_at) = self.turn_midpoint(total);
                let confidence = (size as f64 / 15.0 + total.abs() / 180.0).min(1.0);
                Maneuver {
                    track_id: self.track_id,
                    cumulative_heading_change: total,
                    latitude,
                    longitude,
                    occurred_at,
                    kind,
                    confidence,
                }
            })
        } else {
            None
        };

        // Reseed with only the last point for continuity into the next turn
        if let Some(last) = self.buffer.back().cloned() {
            self.seed(last.latitude, last.longitude, last.at, last.heading);
        }
        maneuver
    }

    /// Classify a finalized turn. Returns `None` when the turn should be
    /// discarded (a would-be spin that took too long is drift, not a
    /// penalty turn).
    fn classify(&self, total: f64) -> Option<ManeuverKind> {
        let cfg = &self.config;

        if total.abs() >= cfg.spin_threshold {
            let duration = self.buffer_duration_secs();
            if duration <= cfg.spin_max_duration_secs {
                return Some(ManeuverKind::PenaltySpin);
            }
            return None;
        }

        if let Some(wind) = self.wind_degrees {
            if self.crossed_through(wind, cfg.tack_wind_window) {
                return Some(ManeuverKind::Tack);
            }
            let downwind = (wind + 180.0).rem_euclid(360.0);
            if self.crossed_through(downwind, cfg.jibe_wind_window) {
                return Some(ManeuverKind::Jibe);
            }
        }

        if total.abs() >= cfg.rounding_threshold {
            Some(ManeuverKind::Rounding)
        } else if total.abs() >= cfg.tack_threshold {
            Some(ManeuverKind::Tack)
        } else if total.abs() >= cfg.jibe_threshold {
            Some(ManeuverKind::Jibe)
        } else {
            Some(ManeuverKind::Unknown)
        }
    }

    /// Did the buffered headings come within `window` degrees of `reference`
    /// on both sides of it?
    fn crossed_through(&self, reference: f64, window: f64) -> bool {
        let mut saw_port = false;
        let mut saw_starboard = false;
        for entry in &self.buffer {
            let diff = signed_angle_diff(reference, entry.heading);
            if diff > 0.0 && diff <= window {
                saw_starboard = true;
            } else if diff < 0.0 && -diff <= window {
                saw_port = true;
            }
            if saw_port && saw_starboard {
                return true;
            }
        }
        false
    }

    fn buffer_duration_secs(&self) -> f64 {
        match (self.buffer.front(), self.buffer.back()) {
            (Some(first), Some(last)) => {
                (last.at - first.at).num_milliseconds() as f64 / 1000.0
            }
            _ => 0.0,
        }
    }

    /// Locate the turn's angular midpoint: the position where the running
    /// cumulative change crosses half the total, linearly interpolated
    /// between the two straddling buffered points. Falls back to the single
    /// buffered point when there is nothing to interpolate between.
    fn turn_midpoint(&self, total: f64) -> (f64, f64, DateTime<Utc>) {
        let entries: Vec<&TurnEntry> = self.buffer.iter().collect();
        if entries.len() < 2 {
            let only = entries[0];
            return (only.latitude, only.longitude, only.at);
        }

        let half = total / 2.0;
        for pair in entries.windows(2) {
            let (before, after) = (pair[0], pair[1]);
            let crossed = if total >= 0.0 {
                before.cumulative <= half && after.cumulative >= half
            } else {
                before.cumulative >= half && after.cumulative <= half
            };
            if crossed {
                let span = after.cumulative - before.cumulative;
                let fraction = if span.abs() < 1e-9 {
                    0.5
                } else {
                    ((half - before.cumulative) / span).clamp(0.0, 1.0)
                };
                let latitude = before.latitude + fraction * (after.latitude - before.latitude);
                let longitude = before.longitude + fraction * (after.longitude - before.longitude);
                let millis = (after.at - before.at).num_milliseconds() as f64;
                let at = before.at + Duration::milliseconds((millis * fraction) as i64);
                return (latitude, longitude, at);
            }
        }

        // No straddling pair (cumulative sum is not monotone); use the
        // middle entry directly
        let mid = entries[entries.len() / 2];
        (mid.latitude, mid.longitude, mid.at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn point(id: u64, lat: f64, lon: f64, secs: i64, heading: f64) -> TrackPoint {
        let mut p = TrackPoint::new(id, lat, lon, 5.0, Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap());
        p.heading = Some(heading);
        p
    }

    /// Feed a heading sequence, one point per second, along a nominal
    /// position; returns all emitted maneuvers.
    fn run_headings(headings: &[f64], wind: Option<f64>) -> Vec<Maneuver> {
        let mut detector = TurnDetector::new(TrackId(1), wind, ManeuverConfig::default());
        let mut out = Vec::new();
        for (i, h) in headings.iter().enumerate() {
            let p = point(i as u64, 54.32 + i as f64 * 1e-5, 10.15, i as i64, *h);
            if let Some(m) = detector.push(&p) {
                out.push(m);
            }
        }
        if let Some(m) = detector.finish() {
            out.push(m);
        }
        out
    }

    /// Steady, turn smoothly through `change` degrees, steady again.
    fn turn_sequence(start: f64, change: f64, step: f64) -> Vec<f64> {
        let mut headings = vec![start; 4];
        let steps = (change.abs() / step).ceil() as usize;
        for i in 1..=steps {
            let h = start + change.signum() * step * i as f64;
            headings.push(h.rem_euclid(360.0));
        }
        let last = *headings.last().unwrap();
        headings.extend(std::iter::repeat(last).take(4));
        headings
    }

    #[test]
    fn test_single_smooth_turn_is_one_rounding() {
        // 0° to 180° at 15°/s: finishes well inside the 15 s window
        let maneuvers = run_headings(&turn_sequence(0.0, 180.0, 15.0), None);
        assert_eq!(maneuvers.len(), 1);
        let m = &maneuvers[0];
        assert!((m.cumulative_heading_change - 180.0).abs() < 10.0, "got {}", m.cumulative_heading_change);
        assert_eq!(m.kind, ManeuverKind::Rounding);
        assert!(m.confidence > 0.5 && m.confidence <= 1.0);
    }

    #[test]
    fn test_small_wiggle_below_threshold_ignored() {
        let maneuvers = run_headings(&turn_sequence(0.0, 20.0, 10.0), None);
        assert!(maneuvers.is_empty());
    }

    #[test]
    fn test_steady_course_produces_nothing() {
        let maneuvers = run_headings(&[90.0; 30], None);
        assert!(maneuvers.is_empty());
    }

    #[test]
    fn test_ninety_degree_turn_is_tack_fallback() {
        let maneuvers = run_headings(&turn_sequence(30.0, 90.0, 15.0), None);
        assert_eq!(maneuvers.len(), 1);
        assert_eq!(maneuvers[0].kind, ManeuverKind::Tack);
    }

    #[test]
    fn test_forty_degree_turn_is_jibe_fallback() {
        let maneuvers = run_headings(&turn_sequence(10.0, 40.0, 10.0), None);
        assert_eq!(maneuvers.len(), 1);
        assert_eq!(maneuvers[0].kind, ManeuverKind::Jibe);
    }

    #[test]
    fn test_wind_aware_tack() {
        // Wind from 0°: a 315° -> 45° turn crosses head-to-wind on both sides
        let maneuvers = run_headings(&turn_sequence(315.0, 90.0, 15.0), Some(0.0));
        assert_eq!(maneuvers.len(), 1);
        assert_eq!(maneuvers[0].kind, ManeuverKind::Tack);
    }

    #[test]
    fn test_wind_aware_jibe() {
        // Wind from 0°, dead downwind 180°: a 160° -> 200° turn crosses it.
        // 40° total is only a jibe numerically too, but the wind path must
        // classify it first.
        let maneuvers = run_headings(&turn_sequence(160.0, 40.0, 10.0), Some(0.0));
        assert_eq!(maneuvers.len(), 1);
        assert_eq!(maneuvers[0].kind, ManeuverKind::Jibe);
    }

    #[test]
    fn test_wind_changes_classification_of_same_turn() {
        // A 100° turn from 130° to 230° crosses dead downwind (180° for
        // wind from 0°). Without a wind hint the numeric fallback calls it
        // a tack; with the hint the wind-aware path calls it a jibe.
        let without = run_headings(&turn_sequence(130.0, 100.0, 15.0), None);
        let with = run_headings(&turn_sequence(130.0, 100.0, 15.0), Some(0.0));
        assert_eq!(without[0].kind, ManeuverKind::Tack);
        assert_eq!(with[0].kind, ManeuverKind::Jibe);
    }

    #[test]
    fn test_fast_full_spin_is_penalty() {
        // 360° in 9 points at 45°/s, well under the 20 s ceiling.
        // 45°/s steps also never trip the stability counter mid-spin.
        let maneuvers = run_headings(&turn_sequence(0.0, 360.0, 45.0), None);
        assert_eq!(maneuvers.len(), 1);
        assert_eq!(maneuvers[0].kind, ManeuverKind::PenaltySpin);
    }

    #[test]
    fn test_midpoint_interpolated_inside_turn() {
        let headings = turn_sequence(0.0, 180.0, 15.0);
        let maneuvers = run_headings(&headings, None);
        let m = &maneuvers[0];
        // The apex must fall within the fed positions
        assert!(m.latitude >= 54.32 && m.latitude <= 54.32 + headings.len() as f64 * 1e-5);
    }

    #[test]
    fn test_detection_is_deterministic() {
        let headings = turn_sequence(0.0, 180.0, 15.0);
        let a = run_headings(&headings, None);
        let b = run_headings(&headings, None);
        assert_eq!(a.len(), b.len());
        assert_eq!(a[0].cumulative_heading_change, b[0].cumulative_heading_change);
        assert_eq!(a[0].kind, b[0].kind);
    }

    #[test]
    fn test_points_without_heading_ignored() {
        let mut detector = TurnDetector::new(TrackId(1), None, ManeuverConfig::default());
        let mut p = point(1, 54.32, 10.15, 0, 0.0);
        p.heading = None;
        assert!(detector.push(&p).is_none());
        assert!(detector.finish().is_none());
    }

    #[test]
    fn test_two_consecutive_turns() {
        // 0 -> 90, hold, 90 -> 180, hold: two distinct tacks
        let mut headings = turn_sequence(0.0, 90.0, 15.0);
        headings.extend(turn_sequence(90.0, 90.0, 15.0).into_iter().skip(4));
        let maneuvers = run_headings(&headings, None);
        assert_eq!(maneuvers.len(), 2);
        assert_eq!(maneuvers[0].kind, ManeuverKind::Tack);
        assert_eq!(maneuvers[1].kind, ManeuverKind::Tack);
    }
}
