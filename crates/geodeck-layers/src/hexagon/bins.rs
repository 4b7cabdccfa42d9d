use std::collections::HashMap;
use std::f64::consts::PI;

use geodeck_engine::glam::DVec2;

use crate::common::Color;

/// One occupied hexagon.
#[derive(Debug, Clone, PartialEq)]
pub struct HexBin {
    /// `[lng, lat]` of the hexagon center.
    pub center: [f64; 2],
    pub count: usize,
    /// Indices of the binned data.
    pub points: Vec<usize>,
    pub color: Color,
}

/// Pointy-top hexagon grid, `radius` in world units.
#[derive(Debug, Copy, Clone, PartialEq)]
pub(crate) struct HexGrid {
    pub radius: f64,
}

impl HexGrid {
    #[inline]
    fn dx(self) -> f64 {
        self.radius * 3f64.sqrt()
    }

    #[inline]
    fn dy(self) -> f64 {
        self.radius * 1.5
    }

    /// `(column, row)` of the hexagon containing `p`.
    pub fn cell(self, p: DVec2) -> (i64, i64) {
        let odd = |row: f64| (row as i64).rem_euclid(2) == 1;
        let py = p.y / self.dy();
        let mut row = py.round();
        let px = p.x / self.dx() - if odd(row) { 0.5 } else { 0.0 };
        let mut col = px.round();

        // Near a row boundary the neighbouring row may be closer.
        let py1 = py - row;
        if py1.abs() * 3.0 > 1.0 {
            let px1 = px - col;
            let col2 = col + if px < col { -0.5 } else { 0.5 };
            let row2 = row + if py < row { -1.0 } else { 1.0 };
            let (px2, py2) = (px - col2, py - row2);
            if px1 * px1 + py1 * py1 > px2 * px2 + py2 * py2 {
                col = col2 + if odd(row) { 0.5 } else { -0.5 };
                row = row2;
            }
        }
        (col as i64, row as i64)
    }

    pub fn center(self, (col, row): (i64, i64)) -> DVec2 {
        let shift = if row.rem_euclid(2) == 1 { 0.5 } else { 0.0 };
        DVec2::new((col as f64 + shift) * self.dx(), row as f64 * self.dy())
    }

    /// Corners around `center`, top first, clockwise on screen.
    pub fn corners(self, center: DVec2, coverage: f64) -> [DVec2; 6] {
        let r = self.radius * coverage;
        std::array::from_fn(|k| {
            let angle = k as f64 * PI / 3.0;
            center + DVec2::new(angle.sin() * r, -angle.cos() * r)
        })
    }
}

/// Groups `points` by hexagon, in order of first occupancy.
pub(crate) fn bin_points(grid: HexGrid, points: impl IntoIterator<Item = (usize, DVec2)>) -> Vec<((i64, i64), Vec<usize>)> {
    let mut index: HashMap<(i64, i64), usize> = HashMap::new();
    let mut bins: Vec<((i64, i64), Vec<usize>)> = Vec::new();
    for (i, p) in points {
        if !p.is_finite() {
            continue;
        }
        let cell = grid.cell(p);
        let slot = *index.entry(cell).or_insert_with(|| {
            bins.push((cell, Vec::new()));
            bins.len() - 1
        });
        bins[slot].1.push(i);
    }
    bins
}

/// Linear-interpolated quantile of ascending `sorted`.
pub(crate) fn quantile(sorted: &[f64], p: f64) -> f64 {
    match sorted {
        [] => 0.0,
        [only] => *only,
        _ => {
            let h = (sorted.len() - 1) as f64 * p.clamp(0.0, 1.0);
            let lo = h.floor() as usize;
            let hi = (lo + 1).min(sorted.len() - 1);
            sorted[lo] + (sorted[hi] - sorted[lo]) * (h - lo as f64)
        }
    }
}

/// Maps bin counts to colours by quantile.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ColorScale {
    lower: f64,
    upper: f64,
    thresholds: Vec<f64>,
    colors: Vec<Color>,
}

impl ColorScale {
    /// Counts outside the `[lower, upper]` percentiles get no colour.
    pub fn new(counts: &[usize], colors: &[Color], lower_percentile: f64, upper_percentile: f64) -> Self {
        let mut sorted: Vec<f64> = counts.iter().map(|&c| c as f64).collect();
        sorted.sort_by(f64::total_cmp);
        let lower = quantile(&sorted, lower_percentile / 100.0);
        let upper = quantile(&sorted, upper_percentile / 100.0);

        let domain: Vec<f64> = sorted.into_iter().filter(|c| (lower..=upper).contains(c)).collect();
        let n = colors.len();
        let thresholds = (1..n).map(|k| quantile(&domain, k as f64 / n as f64)).collect();
        Self {
            lower,
            upper,
            thresholds,
            colors: colors.to_vec(),
        }
    }

    pub fn color(&self, count: usize) -> Option<Color> {
        let value = count as f64;
        if value < self.lower || value > self.upper {
            return None;
        }
        let slot = self.thresholds.partition_point(|t| *t <= value);
        self.colors.get(slot.min(self.colors.len().saturating_sub(1))).copied()
    }
}
