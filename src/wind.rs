//! # Wind Direction Inference
//!
//! Estimates the true wind direction for one track from its heading stream.
//!
//! Two passes over the headings:
//!
//! 1. **Stable-run extraction**: grow a run while each new heading stays
//!    within a tolerance of the run's circular mean; close it when it
//!    breaks, keep it when it is long enough. Upwind legs show up as long
//!    stable runs on two headings roughly 90° apart.
//! 2. **Clustering and pairing**: merge runs with nearby circular means
//!    into clusters, then pick the cluster pair separated by a
//!    close-hauled-to-close-hauled angle (80-110°) with the most points
//!    behind it: the most frequently sailed tack pair.
//!
//! The wind bearing is the circular midpoint after offsetting each side by
//! the close-hauled angle toward the other, rounded to the nearest 5°. The
//! offset (default 45°) is a heuristic constant, configurable rather than
//! physically derived. No qualifying pair means no estimate: `None`,
//! never 0°.

use crate::geo_utils::{circular_diff, signed_angle_diff, vector_heading};

/// Configuration for wind inference.
#[derive(Debug, Clone)]
pub struct WindConfig {
    /// A heading may deviate this much from the run's circular mean and
    /// still extend the run, degrees. Default: 5.
    pub run_tolerance: f64,
    /// Minimum points for a run to be kept. Default: 30.
    pub min_run_length: usize,
    /// Runs whose means are within this merge into one cluster, degrees.
    /// Default: 10.
    pub cluster_tolerance: f64,
    /// Minimum cluster separation for a tack pair, degrees. Default: 80.
    pub pair_min_separation: f64,
    /// Maximum cluster separation for a tack pair, degrees. Default: 110.
    pub pair_max_separation: f64,
    /// Close-hauled offset applied to each side of the pair, degrees.
    /// Default: 45.
    pub close_hauled_offset: f64,
    /// Rounding bucket for the result, degrees. Default: 5.
    pub rounding: u16,
}

impl Default for WindConfig {
    fn default() -> Self {
        Self {
            run_tolerance: 5.0,
            min_run_length: 30,
            cluster_tolerance: 10.0,
            pair_min_separation: 80.0,
            pair_max_separation: 110.0,
            close_hauled_offset: 45.0,
            rounding: 5,
        }
    }
}

/// A maximal stretch of near-constant heading.
#[derive(Debug, Clone, Copy)]
pub struct StableRun {
    /// Circular mean heading of the run, degrees [0, 360).
    pub heading: f64,
    /// Number of points in the run.
    pub count: usize,
}

/// Streaming extractor of stable heading runs. Feed headings in capture
/// order; call [`StableRunExtractor::finish`] to collect the kept runs.
#[derive(Debug)]
pub struct StableRunExtractor {
    tolerance: f64,
    min_length: usize,
    sin_sum: f64,
    cos_sum: f64,
    count: usize,
    runs: Vec<StableRun>,
}

impl StableRunExtractor {
    pub fn new(config: &WindConfig) -> Self {
        Self {
            tolerance: config.run_tolerance,
            min_length: config.min_run_length,
            sin_sum: 0.0,
            cos_sum: 0.0,
            count: 0,
            runs: Vec::new(),
        }
    }

    /// Feed one heading, degrees.
    pub fn push(&mut self, heading: f64) {
        if !heading.is_finite() {
            return;
        }
        if self.count > 0 {
            match vector_heading(self.sin_sum, self.cos_sum) {
                Some(mean) if circular_diff(mean, heading) <= self.tolerance => {}
                _ => self.close_run(),
            }
        }
        let r = heading.to_radians();
        self.sin_sum += r.sin();
        self.cos_sum += r.cos();
        self.count += 1;
    }

    /// Close the final run and return every kept run.
    pub fn finish(mut self) -> Vec<StableRun> {
        self.close_run();
        self.runs
    }

    fn close_run(&mut self) {
        if self.count >= self.min_length {
            if let Some(heading) = vector_heading(self.sin_sum, self.cos_sum) {
                self.runs.push(StableRun { heading, count: self.count });
            }
        }
        self.sin_sum = 0.0;
        self.cos_sum = 0.0;
        self.count = 0;
    }
}

/// A merged group of stable runs with a shared heading.
#[derive(Debug, Clone)]
struct HeadingCluster {
    sin_sum: f64,
    cos_sum: f64,
    heading: f64,
    /// Total points across contained runs.
    count: usize,
}

impl HeadingCluster {
    fn from_run(run: &StableRun) -> Self {
        let r = run.heading.to_radians();
        Self {
            sin_sum: r.sin(),
            cos_sum: r.cos(),
            heading: run.heading,
            count: run.count,
        }
    }

    fn merge(&mut self, run: &StableRun) {
        let r = run.heading.to_radians();
        self.sin_sum += r.sin();
        self.cos_sum += r.cos();
        self.count += run.count;
        if let Some(heading) = vector_heading(self.sin_sum, self.cos_sum) {
            self.heading = heading;
        }
    }
}

/// Merge stable runs into heading clusters (first cluster within tolerance
/// wins, mean recomputed on each merge).
fn cluster_runs(runs: &[StableRun], config: &WindConfig) -> Vec<HeadingCluster> {
    let mut clusters: Vec<HeadingCluster> = Vec::new();
    for run in runs {
        match clusters
            .iter_mut()
            .find(|c| circular_diff(c.heading, run.heading) <= config.cluster_tolerance)
        {
            Some(cluster) => cluster.merge(run),
            None => clusters.push(HeadingCluster::from_run(run)),
        }
    }
    clusters
}

/// Estimate the wind direction from extracted stable runs.
///
/// Returns degrees 0–359 rounded to the configured bucket, or `None` when
/// no cluster pair falls in the tack-separation window.
pub fn estimate_from_runs(runs: &[StableRun], config: &WindConfig) -> Option<u16> {
    let clusters = cluster_runs(runs, config);
    if clusters.len() < 2 {
        return None;
    }

    // Best tack pair: separation in window, most points behind it
    let mut best: Option<(usize, usize, usize)> = None;
    for i in 0..clusters.len() {
        for j in (i + 1)..clusters.len() {
            let separation = circular_diff(clusters[i].heading, clusters[j].heading);
            if separation < config.pair_min_separation || separation > config.pair_max_separation {
                continue;
            }
            let combined = clusters[i].count + clusters[j].count;
            if best.map_or(true, |(_, _, c)| combined > c) {
                best = Some((i, j, combined));
            }
        }
    }
    let (i, j, _) = best?;

    // Rotate each close-hauled heading toward the other; their circular
    // midpoint bisects the pair, which is the wind-from bearing
    let a = clusters[i].heading;
    let b = clusters[j].heading;
    let toward = signed_angle_diff(a, b).signum();
    let a_off = (a + toward * config.close_hauled_offset).to_radians();
    let b_off = (b - toward * config.close_hauled_offset).to_radians();
    let wind = vector_heading(a_off.sin() + b_off.sin(), a_off.cos() + b_off.cos())?;

    let bucket = f64::from(config.rounding.max(1));
    let rounded = (wind / bucket).round() * bucket;
    Some((rounded.rem_euclid(360.0)) as u16)
}

/// Convenience wrapper: extract stable runs from a heading stream and
/// estimate the wind in one call.
pub fn infer_from_headings<I>(headings: I, config: &WindConfig) -> Option<u16>
where
    I: IntoIterator<Item = f64>,
{
    let mut extractor = StableRunExtractor::new(config);
    for h in headings {
        extractor.push(h);
    }
    estimate_from_runs(&extractor.finish(), config)
}
