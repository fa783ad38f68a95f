// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The CRUISE `.cru` format: frequency-indexed azimuth and elevation
//! cuts.
//!
//! Each axis stores a regular angle grid and, per frequency, a row of
//! *voltage* gains. Voltages are squared into power dB at load so the
//! query path works in dB like every other pattern. Query frequencies
//! clamp to the ends of the frequency axis and blend linearly between
//! bracketing rows otherwise.

use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use ndarray::Array2;

use crate::{
    angle::{voltage_to_db, wrap_half_pi, wrap_pi},
    constants::SMALL_DB,
    errors::{GainError, PatternFileError},
    table::Lerp,
    types::{ErrorSink, ErrorSlot, GainParams, MinMaxCache, MinMaxKey, PatternType, Polarity},
};

use super::{
    bracket, combine_gains, parse_token, relative_offset, split_exact, DataLines, RegularGrid,
};

/// One CRUISE axis: `gains_db[freq_index][angle_index]`.
#[derive(Debug, Clone)]
struct CruiseAxis {
    angles: RegularGrid,
    freqs: Vec<f64>,
    gains_db: Array2<f64>,
}

impl CruiseAxis {
    /// Interpolated sample: linear in angle (clamped at the grid edges),
    /// linear between the bracketing frequency rows (clamped at the axis
    /// ends).
    fn sample(&self, angle: f64, freq: f64) -> f64 {
        let (f0, f1, tf) = bracket(&self.freqs, freq);
        let (a0, a1, ta) = self.angles.weights(angle);
        let row0 = f64::lerp(self.gains_db[[f0, a0]], self.gains_db[[f0, a1]], ta);
        let row1 = f64::lerp(self.gains_db[[f1, a0]], self.gains_db[[f1, a1]], ta);
        f64::lerp(row0, row1, tf)
    }

    /// Value extremes over the angle grid at a fixed query frequency.
    fn extremes_at(&self, freq: f64) -> (f64, f64) {
        let (f0, f1, tf) = bracket(&self.freqs, freq);
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for a in 0..self.angles.len() {
            let g = f64::lerp(self.gains_db[[f0, a]], self.gains_db[[f1, a]], tf);
            lo = lo.min(g);
            hi = hi.max(g);
        }
        (lo, hi)
    }

    fn stored_max(&self) -> f64 {
        self.gains_db.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }
}

/// An antenna pattern loaded from a CRUISE `.cru` file.
#[derive(Debug, Clone)]
pub struct CruisePattern {
    azim: CruiseAxis,
    elev: CruiseAxis,
    /// Default query frequency \[Hz\] recorded at load time.
    freq_hint_hz: f64,
    valid: bool,
    filename: String,
    polarity: Polarity,
    cache: MinMaxCache,
    errors: ErrorSlot,
}

impl CruisePattern {
    /// Load a `.cru` file. `freq_hint_mhz` is the default query
    /// frequency used when a query passes `freq = 0`.
    pub fn new<T: AsRef<Path>>(file: T, freq_hint_mhz: f64) -> Result<CruisePattern, PatternFileError> {
        let mut pattern =
            CruisePattern::from_reader(BufReader::new(File::open(&file)?), freq_hint_mhz)?;
        pattern.filename = file.as_ref().to_string_lossy().into_owned();
        Ok(pattern)
    }

    pub(crate) fn from_reader<R: BufRead>(
        reader: R,
        freq_hint_mhz: f64,
    ) -> Result<CruisePattern, PatternFileError> {
        let mut lines = DataLines::new(reader, "#");
        let azim = read_axis(&mut lines)?;
        let elev = read_axis(&mut lines)?;
        Ok(CruisePattern {
            azim,
            elev,
            freq_hint_hz: freq_hint_mhz * 1.0e6,
            valid: true,
            filename: String::new(),
            polarity: Polarity::Unknown,
            cache: MinMaxCache::default(),
            errors: ErrorSlot::default(),
        })
    }

    pub fn pattern_type(&self) -> PatternType {
        PatternType::Cruise
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn polarity(&self) -> Polarity {
        self.polarity
    }

    pub fn last_error(&self) -> Option<GainError> {
        self.errors.last()
    }

    pub fn set_error_sink(&mut self, sink: ErrorSink) {
        self.errors.set_sink(sink);
    }

    /// The frequencies stored on the azimuth axis \[Hz\].
    pub fn freqs(&self) -> &[f64] {
        &self.azim.freqs
    }

    fn effective_freq(&self, params: &GainParams) -> f64 {
        if params.freq > 0.0 {
            params.freq
        } else {
            self.freq_hint_hz
        }
    }

    /// Compute the gain \[dB\] in the queried direction at the query
    /// frequency.
    pub fn gain(&self, params: &GainParams) -> f64 {
        if !self.valid {
            self.errors.report(GainError::InvalidPattern);
            return SMALL_DB;
        }
        let az = wrap_pi(params.azim);
        let el = wrap_half_pi(params.elev);
        let freq = self.effective_freq(params);
        let g_az = self.azim.sample(az, freq);
        let g_el = self.elev.sample(el, freq);
        let combined = combine_gains(g_az, g_el, az, el, params.weighting);
        let offset = relative_offset(
            self.azim.stored_max() + self.elev.stored_max(),
            params.ref_gain,
        );
        (combined + offset).max(SMALL_DB)
    }

    /// The gain range at the query frequency, via the single-slot cache.
    pub fn min_max_gain(&self, params: &GainParams) -> (f64, f64) {
        if !self.valid {
            self.errors.report(GainError::InvalidPattern);
            return (SMALL_DB, SMALL_DB);
        }
        let key = MinMaxKey::new(params);
        if let Some(cached) = self.cache.get(key) {
            return cached;
        }
        let freq = self.effective_freq(params);
        let (a_lo, a_hi) = self.azim.extremes_at(freq);
        let (e_lo, e_hi) = self.elev.extremes_at(freq);
        let offset = relative_offset(
            self.azim.stored_max() + self.elev.stored_max(),
            params.ref_gain,
        );
        let (lo, hi) = if params.weighting {
            (
                (a_lo + e_lo).min(a_lo).min(e_lo),
                (a_hi + e_hi).max(a_hi).max(e_hi),
            )
        } else {
            (a_lo + e_lo, a_hi + e_hi)
        };
        let result = ((lo + offset).max(SMALL_DB), (hi + offset).max(SMALL_DB));
        self.cache.store(key, result.0, result.1);
        result
    }
}

/// Read one axis: `angle_count freq_count`, `min_deg step_deg`, the
/// frequency line, then one row of voltage gains per frequency.
fn read_axis<R: BufRead>(lines: &mut DataLines<R>) -> Result<CruiseAxis, PatternFileError> {
    let (ln, header) = lines.expect_data()?;
    let toks = split_exact(&header, 2, ln)?;
    let angle_count: usize = parse_token(toks[0], ln)?;
    let freq_count: usize = parse_token(toks[1], ln)?;
    if freq_count == 0 {
        return Err(PatternFileError::BadGrid("no frequency rows".to_string()));
    }

    let (ln, limits) = lines.expect_data()?;
    let toks = split_exact(&limits, 2, ln)?;
    let min_deg: f64 = parse_token(toks[0], ln)?;
    let step_deg: f64 = parse_token(toks[1], ln)?;
    let angles = RegularGrid::from_count(min_deg.to_radians(), step_deg.to_radians(), angle_count)?;

    let (ln, freq_line) = lines.expect_data()?;
    let freq_toks = split_exact(&freq_line, freq_count, ln)?;
    let mut freqs = Vec::with_capacity(freq_count);
    for tok in freq_toks {
        let f: f64 = parse_token(tok, ln)?;
        if let Some(&prev) = freqs.last() {
            if f <= prev {
                return Err(PatternFileError::KeysNotAscending { line: ln });
            }
        }
        freqs.push(f);
    }

    let mut gains_db = Array2::zeros((freq_count, angle_count));
    for fi in 0..freq_count {
        let (ln, row) = match lines.next_data()? {
            Some(x) => x,
            None => {
                return Err(PatternFileError::TruncatedFile {
                    expected: freq_count,
                    got: fi,
                })
            }
        };
        let toks = split_exact(&row, angle_count, ln)?;
        for (ai, tok) in toks.iter().enumerate() {
            let voltage: f64 = parse_token(tok, ln)?;
            gains_db[[fi, ai]] = voltage_to_db(voltage);
        }
    }

    Ok(CruiseAxis {
        angles,
        freqs,
        gains_db,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::io::Cursor;

    /// Five frequencies, identical unit-voltage rows: gain must be
    /// frequency-independent.
    fn flat_cru_text() -> String {
        let mut s = String::from("# wideband test antenna\n");
        for _axis in 0..2 {
            s.push_str("5 5\n-180 90\n");
            s.push_str("8e9 10e9 12e9 14e9 16e9\n");
            for _f in 0..5 {
                s.push_str("1 1 1 1 1\n");
            }
        }
        s
    }

    fn shaped_cru_text() -> String {
        // Two frequencies with different voltage rows on the azimuth
        // axis; elevation flat.
        let mut s = String::from("3 2\n-90 90\n8e9 12e9\n");
        s.push_str("0.1 1 0.1\n");
        s.push_str("0.2 1 0.2\n");
        s.push_str("3 2\n-90 90\n8e9 12e9\n");
        s.push_str("1 1 1\n1 1 1\n");
        s
    }

    #[test]
    fn frequency_independent_data_gives_frequency_independent_gain() {
        let cru = CruisePattern::from_reader(Cursor::new(flat_cru_text()), 0.0).unwrap();
        let mut p = GainParams {
            azim: 0.3,
            elev: -0.1,
            ..Default::default()
        };
        p.freq = 8.0e9;
        let g8 = cru.gain(&p);
        p.freq = 9.0e9;
        let g9 = cru.gain(&p);
        p.freq = 10.0e9;
        let g10 = cru.gain(&p);
        assert_abs_diff_eq!(g8, g9, epsilon = 1e-6);
        assert_abs_diff_eq!(g9, g10, epsilon = 1e-6);
    }

    #[test]
    fn unit_voltage_is_relative_zero_db() {
        let cru = CruisePattern::from_reader(Cursor::new(flat_cru_text()), 0.0).unwrap();
        // 20·log10(1) = 0 on both cuts: a relative table, so ref_gain
        // comes straight through.
        let p = GainParams {
            ref_gain: 14.0,
            freq: 10.0e9,
            ..Default::default()
        };
        assert_abs_diff_eq!(cru.gain(&p), 14.0);
    }

    #[test]
    fn voltage_conversion_and_frequency_blend() {
        let cru = CruisePattern::from_reader(Cursor::new(shaped_cru_text()), 0.0).unwrap();
        // At 8 GHz the azimuth edge is 20·log10(0.1) = -20 dB; at 12 GHz
        // it is ≈ -13.98 dB.
        let mut p = GainParams {
            azim: -90.0_f64.to_radians(),
            freq: 8.0e9,
            ..Default::default()
        };
        assert_abs_diff_eq!(cru.gain(&p), -20.0, epsilon = 1e-9);
        p.freq = 12.0e9;
        assert_abs_diff_eq!(cru.gain(&p), 20.0 * 0.2_f64.log10(), epsilon = 1e-9);
        // Half-way in frequency blends the dB rows.
        p.freq = 10.0e9;
        let expected = (-20.0 + 20.0 * 0.2_f64.log10()) / 2.0;
        assert_abs_diff_eq!(cru.gain(&p), expected, epsilon = 1e-9);
    }

    #[test]
    fn out_of_range_frequencies_clamp() {
        let cru = CruisePattern::from_reader(Cursor::new(shaped_cru_text()), 0.0).unwrap();
        let p_low = GainParams {
            azim: -90.0_f64.to_radians(),
            freq: 1.0e9,
            ..Default::default()
        };
        let p_min = GainParams {
            freq: 8.0e9,
            ..p_low
        };
        assert_eq!(cru.gain(&p_low), cru.gain(&p_min));

        let p_high = GainParams {
            freq: 99.0e9,
            ..p_low
        };
        let p_max = GainParams {
            freq: 12.0e9,
            ..p_low
        };
        assert_eq!(cru.gain(&p_high), cru.gain(&p_max));
    }

    #[test]
    fn zero_query_frequency_uses_the_load_hint() {
        let cru = CruisePattern::from_reader(Cursor::new(shaped_cru_text()), 12.0e3).unwrap();
        let p_hint = GainParams {
            azim: -90.0_f64.to_radians(),
            freq: 0.0,
            ..Default::default()
        };
        let p_12 = GainParams {
            freq: 12.0e9,
            ..p_hint
        };
        assert_eq!(cru.gain(&p_hint), cru.gain(&p_12));
    }

    #[test]
    fn min_max_bounds_gain_at_each_frequency() {
        let cru = CruisePattern::from_reader(Cursor::new(shaped_cru_text()), 0.0).unwrap();
        for freq in [8.0e9, 9.5e9, 12.0e9] {
            let base = GainParams {
                freq,
                ..Default::default()
            };
            let (lo, hi) = cru.min_max_gain(&base);
            for az_deg in (-180..=180).step_by(10) {
                let p = GainParams {
                    azim: f64::from(az_deg).to_radians(),
                    ..base
                };
                let g = cru.gain(&p);
                assert!(g >= lo - 1e-9 && g <= hi + 1e-9, "{g} not in [{lo}, {hi}]");
            }
        }
    }

    #[test]
    fn truncated_rows_are_an_error() {
        let text = "3 2\n-90 90\n8e9 12e9\n1 1 1\n";
        assert!(matches!(
            CruisePattern::from_reader(Cursor::new(text), 0.0),
            Err(PatternFileError::TruncatedFile { expected: 2, got: 1 })
        ));
    }

    #[test]
    fn descending_frequency_axis_is_rejected() {
        let text = "3 2\n-90 90\n12e9 8e9\n1 1 1\n1 1 1\n";
        assert!(matches!(
            CruisePattern::from_reader(Cursor::new(text), 0.0),
            Err(PatternFileError::KeysNotAscending { .. })
        ));
    }
}
