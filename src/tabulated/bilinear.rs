// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The `.bil` format: a real-valued 2-D gain grid per frequency plane.
//!
//! Same grid layout as one monopulse channel, but the samples are plain
//! dB values and there is a single block. The frequency axis clamps at
//! its ends (out-of-band queries are not an error here).

use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use ndarray::Array2;

use crate::{
    angle::{wrap_half_pi, wrap_pi},
    constants::SMALL_DB,
    errors::{GainError, PatternFileError},
    table::Lerp,
    types::{ErrorSink, ErrorSlot, GainParams, MinMaxCache, MinMaxKey, PatternType, Polarity},
};

use super::{parse_token, relative_offset, split_exact, DataLines, RegularGrid};

/// An antenna pattern loaded from a `.bil` file.
#[derive(Debug, Clone)]
pub struct BiLinearPattern {
    freqs: RegularGrid,
    az: RegularGrid,
    el: RegularGrid,
    /// One `[az_index, el_index]` dB grid per frequency plane.
    planes: Vec<Array2<f64>>,
    freq_hint_hz: f64,
    valid: bool,
    filename: String,
    polarity: Polarity,
    cache: MinMaxCache,
    errors: ErrorSlot,
}

impl BiLinearPattern {
    /// Load a `.bil` file. `freq_hint_mhz` is the default query
    /// frequency used when a query passes `freq = 0`.
    pub fn new<T: AsRef<Path>>(
        file: T,
        freq_hint_mhz: f64,
    ) -> Result<BiLinearPattern, PatternFileError> {
        let mut pattern =
            BiLinearPattern::from_reader(BufReader::new(File::open(&file)?), freq_hint_mhz)?;
        pattern.filename = file.as_ref().to_string_lossy().into_owned();
        Ok(pattern)
    }

    pub(crate) fn from_reader<R: BufRead>(
        reader: R,
        freq_hint_mhz: f64,
    ) -> Result<BiLinearPattern, PatternFileError> {
        let mut lines = DataLines::new(reader, "#");

        let freqs = read_grid_line(&mut lines, 1.0)?;
        let az = read_grid_line(&mut lines, 1.0_f64.to_radians())?;
        let el = read_grid_line(&mut lines, 1.0_f64.to_radians())?;

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
                let toks = split_exact(&row, el.len(), ln)?;
                for (ei, tok) in toks.iter().enumerate() {
                    plane[[ai, ei]] = parse_token(tok, ln)?;
                }
            }
            planes.push(plane);
        }

        Ok(BiLinearPattern {
            freqs,
            az,
            el,
            planes,
            freq_hint_hz: freq_hint_mhz * 1.0e6,
            valid: true,
            filename: String::new(),
            polarity: Polarity::Unknown,
            cache: MinMaxCache::default(),
            errors: ErrorSlot::default(),
        })
    }

    pub fn pattern_type(&self) -> PatternType {
        PatternType::BiLinear
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

    fn effective_freq(&self, params: &GainParams) -> f64 {
        if params.freq > 0.0 {
            params.freq
        } else {
            self.freq_hint_hz
        }
    }

    /// Bilinear dB sample in the plane pair bracketing `freq` (clamped).
    fn sample(&self, az: f64, el: f64, freq: f64) -> f64 {
        let (f0, f1, tf) = self.freqs.weights(freq);
        let (a0, a1, ta) = self.az.weights(az);
        let (e0, e1, te) = self.el.weights(el);
        let mut out = [0.0; 2];
        for (slot, plane) in out.iter_mut().zip([&self.planes[f0], &self.planes[f1]]) {
            let low = f64::lerp(plane[[a0, e0]], plane[[a1, e0]], ta);
            let high = f64::lerp(plane[[a0, e1]], plane[[a1, e1]], ta);
            *slot = f64::lerp(low, high, te);
        }
        f64::lerp(out[0], out[1], tf)
    }

    fn stored_max(&self) -> f64 {
        self.planes
            .iter()
            .flat_map(|p| p.iter().copied())
            .fold(f64::NEG_INFINITY, f64::max)
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
        let g = self.sample(az, el, self.effective_freq(params));
        let offset = relative_offset(self.stored_max(), params.ref_gain);
        (g + offset).max(SMALL_DB)
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
        let (f0, f1, tf) = self.freqs.weights(self.effective_freq(params));
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for a in 0..self.az.len() {
            for e in 0..self.el.len() {
                let g = f64::lerp(self.planes[f0][[a, e]], self.planes[f1][[a, e]], tf);
                lo = lo.min(g);
                hi = hi.max(g);
            }
        }
        let offset = relative_offset(self.stored_max(), params.ref_gain);
        let result = ((lo + offset).max(SMALL_DB), (hi + offset).max(SMALL_DB));
        self.cache.store(key, result.0, result.1);
        result
    }
}

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
