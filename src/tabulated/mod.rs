// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Tabulated antenna patterns loaded from pattern files.

Each on-disk format gets its own module; this module holds the machinery
they share: line-oriented parsing helpers, regular grid axes, and the
rules for combining azimuth/elevation samples and applying the
reference-gain offset to relative tables.
 */

pub mod bilinear;
pub mod cruise;
pub mod eznec;
pub mod monopulse;
pub mod nsma;
pub mod pat;
pub mod xfdtd;

pub use bilinear::BiLinearPattern;
pub use cruise::CruisePattern;
pub use eznec::EznecPattern;
pub use monopulse::MonopulsePattern;
pub use nsma::NsmaPattern;
pub use pat::{AngleUnits, RelativeTablePattern, TablePattern};
pub use xfdtd::XfdtdPattern;

use std::io::BufRead;

use crate::{constants::RELATIVE_MAX_EPSILON, errors::PatternFileError};

/// Combine the azimuth-table and elevation-table samples \[dB\].
///
/// Unweighted combination adds the two cuts. Weighted combination
/// cross-weights them by angular distance from boresight,
/// `w_az = |el|/(|az| + |el|)`, so the azimuth sample's weight grows
/// with the elevation offset (and vice versa); this suppresses the
/// "cross" artifact when both angles are large. Exactly at boresight the
/// weights are undefined and the unweighted sum is used (both cuts are
/// at their stored maximum there).
pub(crate) fn combine_gains(g_az: f64, g_el: f64, az: f64, el: f64, weighting: bool) -> f64 {
    if !weighting {
        return g_az + g_el;
    }
    let denom = az.abs() + el.abs();
    if denom < 1e-12 {
        return g_az + g_el;
    }
    let w_az = el.abs() / denom;
    w_az * g_az + (1.0 - w_az) * g_el
}

/// The reference-gain offset rule: relative tables (stored maximum of
/// 0 dB) are offset by the caller's reference gain, absolute tables are
/// not.
pub(crate) fn relative_offset(stored_max: f64, ref_gain: f64) -> f64 {
    if stored_max.abs() <= RELATIVE_MAX_EPSILON {
        ref_gain
    } else {
        0.0
    }
}

/// A regular sample axis defined by `min`, `max` and `step`, as used by
/// the gridded formats (Monopulse, BiLinear, XFDTD and the CRUISE angle
/// axes).
#[derive(Debug, Clone)]
pub(crate) struct RegularGrid {
    min: f64,
    step: f64,
    n: usize,
}

impl RegularGrid {
    pub(crate) fn new(min: f64, max: f64, step: f64) -> Result<RegularGrid, PatternFileError> {
        if !(step > 0.0) {
            return Err(PatternFileError::BadGrid(format!(
                "step {step} must be positive"
            )));
        }
        if max <= min {
            return Err(PatternFileError::BadGrid(format!(
                "axis limits [{min}, {max}] are inverted or empty"
            )));
        }
        let n = ((max - min) / step).round() as usize + 1;
        if n < 2 {
            return Err(PatternFileError::BadGrid(format!(
                "axis [{min}, {max}] step {step} yields fewer than two points"
            )));
        }
        Ok(RegularGrid { min, step, n })
    }

    /// An axis described by its origin, step and point count (the CRUISE
    /// header convention).
    pub(crate) fn from_count(min: f64, step: f64, n: usize) -> Result<RegularGrid, PatternFileError> {
        if !(step > 0.0) {
            return Err(PatternFileError::BadGrid(format!(
                "step {step} must be positive"
            )));
        }
        if n < 2 {
            return Err(PatternFileError::BadGrid(format!(
                "axis needs at least two points, got {n}"
            )));
        }
        Ok(RegularGrid { min, step, n })
    }

    pub(crate) fn len(&self) -> usize {
        self.n
    }

    pub(crate) fn min(&self) -> f64 {
        self.min
    }

    pub(crate) fn max(&self) -> f64 {
        self.min + self.step * (self.n - 1) as f64
    }

    pub(crate) fn contains(&self, x: f64) -> bool {
        x >= self.min && x <= self.max()
    }

    /// The bracketing indices and interpolation fraction for `x`,
    /// clamped to the axis ends.
    pub(crate) fn weights(&self, x: f64) -> (usize, usize, f64) {
        if x <= self.min {
            return (0, 0, 0.0);
        }
        if x >= self.max() {
            return (self.n - 1, self.n - 1, 0.0);
        }
        let f = (x - self.min) / self.step;
        let i0 = (f.floor() as usize).min(self.n - 2);
        (i0, i0 + 1, f - i0 as f64)
    }
}

/// The bracketing indices and interpolation fraction of `x` in an
/// ascendingly-sorted explicit axis, clamped to the ends.
pub(crate) fn bracket(axis: &[f64], x: f64) -> (usize, usize, f64) {
    let n = axis.len();
    debug_assert!(n >= 1);
    if n == 1 || x <= axis[0] {
        return (0, 0, 0.0);
    }
    if x >= axis[n - 1] {
        return (n - 1, n - 1, 0.0);
    }
    let i = axis.partition_point(|&a| a < x);
    let t = (x - axis[i - 1]) / (axis[i] - axis[i - 1]);
    (i - 1, i, t)
}

/// Line-oriented reader shared by the format parsers: tracks line
/// numbers, skips blank and comment lines, and reports truncation with
/// a named error.
pub(crate) struct DataLines<R> {
    lines: std::io::Lines<R>,
    line_no: usize,
    comment: &'static str,
}

impl<R: BufRead> DataLines<R> {
    pub(crate) fn new(reader: R, comment: &'static str) -> DataLines<R> {
        DataLines {
            lines: reader.lines(),
            line_no: 0,
            comment,
        }
    }

    pub(crate) fn line_no(&self) -> usize {
        self.line_no
    }

    /// The next line verbatim (NSMA header lines are opaque and must not
    /// be comment-filtered). `None` at end of file.
    pub(crate) fn next_raw(&mut self) -> Result<Option<String>, PatternFileError> {
        match self.lines.next() {
            None => Ok(None),
            Some(line) => {
                self.line_no += 1;
                Ok(Some(line?))
            }
        }
    }

    /// The next non-blank, non-comment line. `None` at end of file.
    pub(crate) fn next_data(&mut self) -> Result<Option<(usize, String)>, PatternFileError> {
        while let Some(line) = self.next_raw()? {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with(self.comment) {
                continue;
            }
            return Ok(Some((self.line_no, trimmed.to_string())));
        }
        Ok(None)
    }

    /// Like [`DataLines::next_data`] but end of file is a parse error.
    pub(crate) fn expect_data(&mut self) -> Result<(usize, String), PatternFileError> {
        self.next_data()?.ok_or(PatternFileError::Parse {
            line: self.line_no,
            msg: "unexpected end of file".to_string(),
        })
    }
}

/// Parse one whitespace-separated token, naming the line on failure.
pub(crate) fn parse_token<T: std::str::FromStr>(
    token: &str,
    line: usize,
) -> Result<T, PatternFileError> {
    token.parse().map_err(|_| PatternFileError::Parse {
        line,
        msg: format!("couldn't parse '{token}' to a number"),
    })
}

/// Split a line into exactly `n` tokens.
pub(crate) fn split_exact(line: &str, n: usize, line_no: usize) -> Result<Vec<&str>, PatternFileError> {
    let toks: Vec<&str> = line.split_whitespace().collect();
    if toks.len() != n {
        return Err(PatternFileError::Parse {
            line: line_no,
            msg: format!("expected {n} fields, got {}", toks.len()),
        });
    }
    Ok(toks)
}

/// Parse an `angle gain` sample line, converting the angle to radians.
pub(crate) fn parse_sample_line(
    line: &str,
    line_no: usize,
) -> Result<(f64, f64), PatternFileError> {
    let toks = split_exact(line, 2, line_no)?;
    let angle_deg: f64 = parse_token(toks[0], line_no)?;
    let gain_db: f64 = parse_token(toks[1], line_no)?;
    Ok((angle_deg.to_radians(), gain_db))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn combine_unweighted_adds() {
        assert_abs_diff_eq!(combine_gains(-3.0, -5.0, 0.2, 0.1, false), -8.0);
    }

    #[test]
    fn combine_weighted_cross_weights_the_cuts() {
        // In the elevation plane (el = 0) the azimuth sample's weight is
        // zero and the elevation cut wins outright.
        assert_abs_diff_eq!(combine_gains(-7.0, 0.0, 0.3, 0.0, true), 0.0);
        // In the azimuth plane (az = 0) the azimuth sample carries full
        // weight.
        assert_abs_diff_eq!(combine_gains(-7.0, -4.0, 0.0, 0.2, true), -7.0);
        // Equal off-axis angles average the cuts.
        assert_abs_diff_eq!(combine_gains(-6.0, -2.0, 0.1, 0.1, true), -4.0);
    }

    #[test]
    fn combine_weighted_boresight_falls_back_to_sum() {
        assert_abs_diff_eq!(combine_gains(-1.0, -2.0, 0.0, 0.0, true), -3.0);
    }

    #[test]
    fn relative_offset_rule() {
        assert_eq!(relative_offset(0.0, 12.0), 12.0);
        assert_eq!(relative_offset(1e-12, 12.0), 12.0);
        assert_eq!(relative_offset(30.0, 12.0), 0.0);
        assert_eq!(relative_offset(-3.0, 12.0), 0.0);
    }

    #[test]
    fn regular_grid_weights_clamp() {
        let g = RegularGrid::new(-10.0, 10.0, 5.0).unwrap();
        assert_eq!(g.len(), 5);
        assert_eq!(g.weights(-99.0), (0, 0, 0.0));
        assert_eq!(g.weights(99.0), (4, 4, 0.0));
        let (i0, i1, t) = g.weights(-2.5);
        assert_eq!((i0, i1), (1, 2));
        assert_abs_diff_eq!(t, 0.5);
        assert_abs_diff_eq!(g.max(), 10.0);
    }

    #[test]
    fn regular_grid_rejects_bad_axes() {
        assert!(RegularGrid::new(0.0, 10.0, 0.0).is_err());
        assert!(RegularGrid::new(10.0, 0.0, 1.0).is_err());
    }

    #[test]
    fn bracket_clamps_and_interpolates() {
        let axis = [8.0e9, 10.0e9, 12.0e9];
        assert_eq!(bracket(&axis, 1.0e9), (0, 0, 0.0));
        assert_eq!(bracket(&axis, 99.0e9), (2, 2, 0.0));
        let (i0, i1, t) = bracket(&axis, 9.0e9);
        assert_eq!((i0, i1), (0, 1));
        assert_abs_diff_eq!(t, 0.5);
    }

    #[test]
    fn data_lines_skip_comments_and_blanks() {
        let text = "// header\n\n1 2\n// mid\n3 4\n";
        let mut lines = DataLines::new(std::io::Cursor::new(text), "//");
        assert_eq!(lines.next_data().unwrap().unwrap().1, "1 2");
        assert_eq!(lines.next_data().unwrap().unwrap().1, "3 4");
        assert!(lines.next_data().unwrap().is_none());
        assert!(lines.expect_data().is_err());
    }
}
