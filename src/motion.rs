//! # Speed and Heading Estimation
//!
//! Sliding-window speed averaging and pairwise heading computation over
//! filtered positions.
//!
//! Speed is smoothed by keeping the last K segment distances and time
//! deltas and dividing the sums, which damps the jitter a single noisy fix
//! would otherwise inject into an instantaneous speed. Heading is the
//! initial great-circle bearing between consecutive filtered points; the
//! first point of a track has neither.

use crate::geo_utils;
use crate::GeoPoint;
use std::collections::VecDeque;

/// Configuration for the speed/heading estimator.
#[derive(Debug, Clone)]
pub struct MotionConfig {
    /// Number of segment samples the speed window holds. Default: 10.
    pub window_size: usize,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self { window_size: 10 }
    }
}

/// Bounded sliding window of segment distances and time deltas.
///
/// Zero or negative time deltas are excluded entirely: they contribute
/// neither distance nor time, so the window can never divide by a zero
/// total time.
#[derive(Debug, Clone)]
pub struct SpeedWindow {
    distances: VecDeque<f64>,
    times: VecDeque<f64>,
    capacity: usize,
}

impl SpeedWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            distances: VecDeque::with_capacity(capacity),
            times: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append one segment. Evicts the oldest sample past capacity.
    pub fn push(&mut self, distance_meters: f64, elapsed_secs: f64) {
        if elapsed_secs <= 0.0 || !elapsed_secs.is_finite() || !distance_meters.is_finite() {
            return;
        }
        if self.distances.len() == self.capacity {
            self.distances.pop_front();
            self.times.pop_front();
        }
        self.distances.push_back(distance_meters);
        self.times.push_back(elapsed_secs);
    }

    /// Smoothed speed in meters per second: total distance over total time
    /// across the window, or 0.0 when the window is empty or the total time
    /// is not positive.
    pub fn speed_mps(&self) -> f64 {
        let total_time: f64 = self.times.iter().sum();
        if total_time <= 0.0 {
            return 0.0;
        }
        let total_distance: f64 = self.distances.iter().sum();
        total_distance / total_time
    }

    /// Smoothed speed in knots.
    pub fn speed_knots(&self) -> f64 {
        geo_utils::mps_to_knots(self.speed_mps())
    }

    pub fn len(&self) -> usize {
        self.distances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.distances.is_empty()
    }
}

/// Heading from one filtered point to the next: initial great-circle
/// bearing in degrees [0, 360).
#[inline]
pub fn heading_between(from: &GeoPoint, to: &GeoPoint) -> f64 {
    geo_utils::initial_bearing(from, to)
}
