//! Swing-foot trajectory.
//!
//! Built once per swing entry as `N` samples, `N = T (1 - phi) / dt`. The
//! vertical axis follows a cubic spline through liftoff, apex and touchdown
//! heights at knots `0`, `N / 2` and `N`; the horizontal axes interpolate
//! linearly from the foot position at swing entry to the footstep target.
//! Sample `k` sits at spline coordinate `k N / (N - 1)`, so the first and last
//! samples land exactly on liftoff and touchdown.
//!
//! Once every sample has been consumed the trajectory keeps returning the last
//! one until the next swing entry replaces it.

use nalgebra::Vector3;

/// Not-a-knot cubic spline through three knots.
///
/// With three knots the not-a-knot conditions force a single cubic whose
/// third derivative vanishes, i.e. the parabola through the knots.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThreeKnotSpline {
    knots: [(f64, f64); 3],
}

impl ThreeKnotSpline {
    /// Knot abscissae must be strictly increasing.
    pub const fn new(knots: [(f64, f64); 3]) -> Self {
        Self { knots }
    }

    pub fn eval(&self, s: f64) -> f64 {
        let [(s0, y0), (s1, y1), (s2, y2)] = self.knots;
        y0 * (s - s1) * (s - s2) / ((s0 - s1) * (s0 - s2))
            + y1 * (s - s0) * (s - s2) / ((s1 - s0) * (s1 - s2))
            + y2 * (s - s0) * (s - s1) / ((s2 - s0) * (s2 - s1))
    }
}

/// Sampled swing path with its consumption index.
#[derive(Debug, Clone, PartialEq)]
pub struct SwingTrajectory {
    samples: Vec<Vector3<f64>>,
    index: usize,
}

impl SwingTrajectory {
    /// Build an `n`-sample path from `start` to `target`.
    ///
    /// `ground` is the liftoff/touchdown height and `apex` the mid-swing
    /// height, both in the same frame as `start` and `target`. `n` must be at
    /// least 2.
    #[allow(clippy::cast_precision_loss)]
    pub fn generate(
        start: &Vector3<f64>,
        target: &Vector3<f64>,
        n: usize,
        ground: f64,
        apex: f64,
    ) -> Self {
        let n = n.max(2);
        let len = n as f64;
        let spline = ThreeKnotSpline::new([(0.0, ground), (len / 2.0, apex), (len, ground)]);
        let last = n - 1;

        let samples = (0..n)
            .map(|k| {
                let z = if k == last {
                    ground
                } else {
                    spline.eval(k as f64 * len / last as f64)
                };
                let xy = if k == last {
                    target.xy()
                } else {
                    start.xy().lerp(&target.xy(), k as f64 / last as f64)
                };
                Vector3::new(xy.x, xy.y, z)
            })
            .collect();

        Self { samples, index: 0 }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[Vector3<f64>] {
        &self.samples
    }

    /// Index of the sample the next call to [`Self::advance`] returns.
    pub const fn index(&self) -> usize {
        self.index
    }

    /// All samples consumed; [`Self::advance`] now holds the last one.
    pub fn is_exhausted(&self) -> bool {
        self.index >= self.samples.len()
    }

    /// Current sample, then move the index forward by one.
    pub fn advance(&mut self) -> Option<Vector3<f64>> {
        let sample = self
            .samples
            .get(self.index)
            .or_else(|| self.samples.last())
            .copied();
        if self.index < self.samples.len() {
            self.index += 1;
        }
        sample
    }
}
