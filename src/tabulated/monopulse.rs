// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The monopulse `.mon` format: complex sum and difference channels.
//!
//! Each channel stores, per frequency plane, a 2-D grid of complex
//! samples given on disk as `(magnitude dB, phase deg)` pairs.
//! Interpolation is carried out on the complex values (bilinear in
//! angle, linear in frequency) so that phase structure such as the
//! difference-channel null survives; only the final result is
//! converted back to dB. Unlike the other frequency-indexed formats the
//! frequency axis does *not* clamp: out-of-band queries are an error.

use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use ndarray::Array2;
use num_complex::Complex64;

use crate::{
    angle::{wrap_half_pi, wrap_pi},
    constants::SMALL_DB,
    errors::{GainError, PatternFileError},
    table::Lerp,
    types::{ErrorSink, ErrorSlot, GainParams, MinMaxCache, MinMaxKey, PatternType, Polarity},
};

use super::{parse_token, split_exact, DataLines, RegularGrid};

/// One monopulse channel: frequency planes over an `(az, el)` grid.
#[derive(Debug, Clone)]
struct MonopulseBlock {
    freqs: RegularGrid,
    az: RegularGrid,
    el: RegularGrid,
    /// One `[az_index, el_index]` grid per frequency plane.
    planes: Vec<Array2<Complex64>>,
}

impl MonopulseBlock {
    /// Bilinear complex interpolation in one frequency plane.
    fn plane_sample(&self, plane: &Array2<Complex64>, az: f64, el: f64) -> Complex64 {
        let (a0, a1, ta) = self.az.weights(az);
        let (e0, e1, te) = self.el.weights(el);
        let low = Complex64::lerp(plane[[a0, e0]], plane[[a1, e0]], ta);
        let high = Complex64::lerp(plane[[a0, e1]], plane[[a1, e1]], ta);
        Complex64::lerp(low, high, te)
    }

    /// The complex response, or `None` when the frequency is out of
    /// band.
    fn sample(&self, az: f64, el: f64, freq: f64) -> Option<Complex64> {
        if !self.freqs.contains(freq) {
            return None;
        }
        let (f0, f1, tf) = self.freqs.weights(freq);
        let c0 = self.plane_sample(&self.planes[f0], az, el);
        let c1 = self.plane_sample(&self.planes[f1], az, el);
        Some(Complex64::lerp(c0, c1, tf))
    }

    /// Magnitude extremes \[dB\] over the angle grid at a fixed in-band
    /// frequency.
    fn extremes_at(&self, freq: f64) -> (f64, f64) {
        let (f0, f1, tf) = self.freqs.weights(freq);
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for a in 0..self.az.len() {
            for e in 0..self.el.len() {
                let c = Complex64::lerp(self.planes[f0][[a, e]], self.planes[f1][[a, e]], tf);
                let db = magnitude_db(c);
                lo = lo.min(db);
                hi = hi.max(db);
            }
        }
        (lo, hi)
    }
}

/// An antenna pattern loaded from a monopulse `.mon` file.
#[derive(Debug, Clone)]
pub struct MonopulsePattern {
    sum: MonopulseBlock,
    diff: MonopulseBlock,
    freq_hint_hz: f64,
    valid: bool,
    filename: String,
    polarity: Polarity,
    cache: MinMaxCache,
    errors: ErrorSlot,
}

impl MonopulsePattern {
    /// Load a `.mon` file. `freq_hint_mhz` is the default query
    /// frequency used when a query passes `freq = 0`.
    pub fn new<T: AsRef<Path>>(
        file: T,
        freq_hint_mhz: f64,
    ) -> Result<MonopulsePattern, PatternFileError> {
        let mut pattern =
            MonopulsePattern::from_reader(BufReader::new(File::open(&file)?), freq_hint_mhz)?;
        pattern.filename = file.as_ref().to_string_lossy().into_owned();
        Ok(pattern)
    }

    pub(crate) fn from_reader<R: BufRead>(
        reader: R,
        freq_hint_mhz: f64,
    ) -> Result<MonopulsePattern, PatternFileError> {
        let mut lines = DataLines::new(reader, "#");
        let sum = read_block(&mut lines, "sum")?;
        let diff = read_block(&mut lines, "diff")?;
        Ok(MonopulsePattern {
            sum,
            diff,
            freq_hint_hz: freq_hint_mhz * 1.0e6,
            valid: true,
            filename: String::new(),
            polarity: Polarity::Unknown,
            cache: MinMaxCache::default(),
            errors: ErrorSlot::default(),
        })
    }

    pub fn pattern_type(&self) -> PatternType {
        PatternType::Monopulse
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

    fn block(&self, params: &GainParams) -> &MonopulseBlock {
        if params.delta {
            &self.diff
        } else {
            &self.sum
        }
    }

    fn effective_freq(&self, params: &GainParams) -> f64 {
        if params.freq > 0.0 {
            params.freq
        } else {
            self.freq_hint_hz
        }
    }

    /// Compute the gain \[dB\] of the selected channel (`delta` false =
    /// sum, true = difference). An out-of-band frequency records
    /// [`GainError::UnsupportedFrequency`] and yields [`SMALL_DB`].
    pub fn gain(&self, params: &GainParams) -> f64 {
        if !self.valid {
            self.errors.report(GainError::InvalidPattern);
            return SMALL_DB;
        }
        let az = wrap_pi(params.azim);
        let el = wrap_half_pi(params.elev);
        let block = self.block(params);
        let freq = self.effective_freq(params);
        match block.sample(az, el, freq) {
            Some(c) => (magnitude_db(c) + params.ref_gain).max(SMALL_DB),
            None => {
                self.errors.report(GainError::UnsupportedFrequency {
                    freq,
                    min: block.freqs.min(),
                    max: block.freqs.max(),
                });
                SMALL_DB
            }
        }
    }

    /// The gain range of the selected channel at the query frequency.
    pub fn min_max_gain(&self, params: &GainParams) -> (f64, f64) {
        if !self.valid {
            self.errors.report(GainError::InvalidPattern);
            return (SMALL_DB, SMALL_DB);
        }
        let key = MinMaxKey::new(params);
        if let Some(cached) = self.cache.get(key) {
            return cached;
        }
        let block = self.block(params);
        let freq = self.effective_freq(params);
        if !block.freqs.contains(freq) {
            self.errors.report(GainError::UnsupportedFrequency {
                freq,
                min: block.freqs.min(),
                max: block.freqs.max(),
            });
            return (SMALL_DB, SMALL_DB);
        }
        let (lo, hi) = block.extremes_at(freq);
        let result = (
            (lo + params.ref_gain).max(SMALL_DB),
            (hi + params.ref_gain).max(SMALL_DB),
        );
        self.cache.store(key, result.0, result.1);
        result
    }
}

/// `20·log10(|c|)` with `hypot` for numeric stability; zero magnitude
/// maps to [`SMALL_DB`].
fn magnitude_db(c: Complex64) -> f64 {
    let mag = c.re.hypot(c.im);
    if mag <= 0.0 {
        SMALL_DB
    } else {
        20.0 * mag.log10()
    }
}

/// A `(magnitude dB, phase deg)` pair as a complex voltage.
fn complex_from_db_phase(mag_db: f64, phase_deg: f64) -> Complex64 {
    let mag = 10.0_f64.powf(mag_db / 20.0);
    let (s, c) = phase_deg.to_radians().sin_cos();
    Complex64::new(mag * c, mag * s)
}

/// Read one channel block: its tag line, three grid lines, then the
/// sample planes.
fn read_block<R: BufRead>(
    lines: &mut DataLines<R>,
    tag: &str,
) -> Result<MonopulseBlock, PatternFileError> {
    let (ln, tag_line) = lines.expect_data()?;
    if !tag_line.eq_ignore_ascii_case(tag) {
        return Err(PatternFileError::Parse {
            line: ln,
            msg: format!("expected '{tag}' block, found '{tag_line}'"),
        });
    }

    let freqs = read_grid_line(lines, 1.0)?;
    let az = read_grid_line(lines, 1.0_f64.to_radians())?;
    let el = read_grid_line(lines, 1.0_f64.to_radians())?;

    let mut planes = Vec::with_capacity(freqs.len());
    for fi in 0..freqs.len() {
        let mut plane = Array2::zeros((az.len(), el.len()));
        for ai in 0..az.len() {
            let (ln, row) = match lines.next_data()? {
                Some(x) => x,
                None => {
                    return Err(PatternFileError::TruncatedFile {
                        expected: freqs.len() * az.len(),
                        got: fi * az.len() + ai,
                    })
                }
            };
            let toks = split_exact(&row, 2 * el.len(), ln)?;
            for ei in 0..el.len() {
                let mag_db: f64 = parse_token(toks[2 * ei], ln)?;
                let phase_deg: f64 = parse_token(toks[2 * ei + 1], ln)?;
                plane[[ai, ei]] = complex_from_db_phase(mag_db, phase_deg);
            }
        }
        planes.push(plane);
    }

    Ok(MonopulseBlock {
        freqs,
        az,
        el,
        planes,
    })
}

/// Read a `min max step` axis line, scaling by `to_internal` (degrees →
/// radians for the angle axes, identity for frequency).
fn read_grid_line<R: BufRead>(
    lines: &mut DataLines<R>,
    to_internal: f64,
) -> Result<RegularGrid, PatternFileError> {
    let (ln, line) = lines.expect_data()?;
    let toks = split_exact(&line, 3, ln)?;
    let min: f64 = parse_token(toks[0], ln)?;
    let max: f64 = parse_token(toks[1], ln)?;
    let step: f64 = parse_token(toks[2], ln)?;
    RegularGrid::new(min * to_internal, max * to_internal, step * to_internal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::io::Cursor;

    /// Two frequency planes, 3×3 angles. The sum channel peaks at
    /// boresight; the difference channel has a phase-reversal null
    /// through the azimuth axis.
    fn mon_text() -> String {
        let mut s = String::from("# test monopulse antenna\nsum\n");
        s.push_str("9e9 11e9 2e9\n-10 10 10\n-10 10 10\n");
        for _f in 0..2 {
            s.push_str("-6 0 -6 0 -6 0\n");
            s.push_str("-6 0 0 0 -6 0\n");
            s.push_str("-6 0 -6 0 -6 0\n");
        }
        s.push_str("diff\n");
        s.push_str("9e9 11e9 2e9\n-10 10 10\n-10 10 10\n");
        for _f in 0..2 {
            s.push_str("-3 180 -3 180 -3 180\n");
            s.push_str("-200 0 -200 0 -200 0\n");
            s.push_str("-3 0 -3 0 -3 0\n");
        }
        s
    }

    fn mon() -> MonopulsePattern {
        MonopulsePattern::from_reader(Cursor::new(mon_text()), 0.0).unwrap()
    }

    #[test]
    fn sum_channel_peaks_at_boresight() {
        let mon = mon();
        let p = GainParams {
            ref_gain: 30.0,
            freq: 10.0e9,
            ..Default::default()
        };
        assert_abs_diff_eq!(mon.gain(&p), 30.0, epsilon = 1e-9);
        let p_off = GainParams {
            azim: 10.0_f64.to_radians(),
            ..p
        };
        assert_abs_diff_eq!(mon.gain(&p_off), 24.0, epsilon = 1e-9);
    }

    #[test]
    fn difference_channel_has_a_null_at_boresight() {
        let mon = mon();
        let p = GainParams {
            ref_gain: 30.0,
            freq: 10.0e9,
            delta: true,
            ..Default::default()
        };
        // The stored az = 0 row is -200 dB; the null survives.
        assert!(mon.gain(&p) < -100.0);
        let p_off = GainParams {
            azim: 10.0_f64.to_radians(),
            ..p
        };
        assert_abs_diff_eq!(mon.gain(&p_off), 27.0, epsilon = 1e-9);
    }

    #[test]
    fn interpolation_is_complex_not_db() {
        // Adjacent difference samples of equal magnitude and opposite
        // phase cancel half-way between; dB-space interpolation would
        // give 0 dB instead.
        let mut text = String::from("sum\n9e9 11e9 2e9\n0 10 10\n0 10 10\n");
        for _ in 0..2 {
            text.push_str("0 0 0 0\n0 0 0 0\n");
        }
        text.push_str("diff\n9e9 11e9 2e9\n0 10 10\n0 10 10\n");
        for _ in 0..2 {
            text.push_str("0 0 0 0\n0 180 0 180\n");
        }
        let mon = MonopulsePattern::from_reader(Cursor::new(text), 0.0).unwrap();
        let p = GainParams {
            freq: 10.0e9,
            delta: true,
            azim: 5.0_f64.to_radians(),
            ..Default::default()
        };
        assert!(mon.gain(&p) < -100.0);
        // The sum channel at the same spot is untouched.
        let p_sum = GainParams { delta: false, ..p };
        assert_abs_diff_eq!(mon.gain(&p_sum), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn out_of_band_frequency_is_reported_and_small() {
        let mon = mon();
        let p = GainParams {
            ref_gain: 30.0,
            freq: 20.0e9,
            ..Default::default()
        };
        assert_eq!(mon.gain(&p), SMALL_DB);
        match mon.last_error() {
            Some(GainError::UnsupportedFrequency { freq, min, max }) => {
                assert_eq!(freq, 20.0e9);
                assert_eq!(min, 9.0e9);
                assert_eq!(max, 11.0e9);
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(mon.min_max_gain(&p), (SMALL_DB, SMALL_DB));
    }

    #[test]
    fn in_band_frequencies_blend_linearly() {
        let mon = mon();
        let mut p = GainParams {
            freq: 9.0e9,
            azim: 10.0_f64.to_radians(),
            ..Default::default()
        };
        let g_lo = mon.gain(&p);
        p.freq = 11.0e9;
        let g_hi = mon.gain(&p);
        // Identical planes: any in-band frequency gives the same answer.
        p.freq = 10.3e9;
        assert_abs_diff_eq!(mon.gain(&p), g_lo, epsilon = 1e-9);
        assert_abs_diff_eq!(g_lo, g_hi, epsilon = 1e-9);
    }

    #[test]
    fn min_max_bounds_each_channel() {
        let mon = mon();
        for delta in [false, true] {
            let base = GainParams {
                ref_gain: 10.0,
                freq: 10.0e9,
                delta,
                ..Default::default()
            };
            let (lo, hi) = mon.min_max_gain(&base);
            assert!(lo <= hi);
            for az_deg in (-10..=10).step_by(2) {
                for el_deg in (-10..=10).step_by(2) {
                    let p = GainParams {
                        azim: f64::from(az_deg).to_radians(),
                        elev: f64::from(el_deg).to_radians(),
                        ..base
                    };
                    let g = mon.gain(&p);
                    assert!(g >= lo - 1e-9 && g <= hi + 1e-9, "{g} not in [{lo}, {hi}]");
                }
            }
        }
    }

    #[test]
    fn missing_diff_block_is_a_parse_error() {
        let mut text = String::from("sum\n9e9 11e9 2e9\n-10 10 10\n-10 10 10\n");
        for _ in 0..2 {
            text.push_str("0 0 0 0 0 0\n0 0 0 0 0 0\n0 0 0 0 0 0\n");
        }
        assert!(matches!(
            MonopulsePattern::from_reader(Cursor::new(text), 0.0),
            Err(PatternFileError::Parse { .. })
        ));
    }
}
