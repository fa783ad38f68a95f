// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The EZNEC `.ezn` far-field export: one azimuth block per elevation
//! slice with `Deg / V dB / H dB / Tot dB` columns.
//!
//! Two azimuth conventions exist on disk. Compass files (any header line
//! containing "compass") count clockwise from north; they are
//! canonicalized at load to the math convention (0 = east,
//! counter-clockwise positive), which is what queries use.

use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use crate::{
    angle::{wrap_half_pi, wrap_pi},
    constants::SMALL_DB,
    errors::{GainError, PatternFileError},
    table::{InterpTable, Lerp},
    types::{ErrorSink, ErrorSlot, GainParams, MinMaxCache, MinMaxKey, PatternType, Polarity},
};

use super::{parse_token, relative_offset, split_exact, DataLines};

/// One elevation slice: azimuth cuts of the three gain columns.
#[derive(Debug, Clone)]
struct EznecSlice {
    elev: f64,
    v: InterpTable<f64>,
    h: InterpTable<f64>,
    tot: InterpTable<f64>,
}

impl EznecSlice {
    fn column(&self, polarity: Polarity) -> &InterpTable<f64> {
        match polarity {
            Polarity::Vertical => &self.v,
            Polarity::Horizontal => &self.h,
            _ => &self.tot,
        }
    }
}

/// An antenna pattern loaded from an EZNEC `.ezn` export.
#[derive(Debug, Clone)]
pub struct EznecPattern {
    /// Slices in ascending elevation order.
    slices: Vec<EznecSlice>,
    compass: bool,
    valid: bool,
    filename: String,
    polarity: Polarity,
    cache: MinMaxCache,
    errors: ErrorSlot,
}

impl EznecPattern {
    /// Load an `.ezn` file.
    pub fn new<T: AsRef<Path>>(file: T) -> Result<EznecPattern, PatternFileError> {
        let mut pattern = EznecPattern::from_reader(BufReader::new(File::open(&file)?))?;
        pattern.filename = file.as_ref().to_string_lossy().into_owned();
        Ok(pattern)
    }

    pub(crate) fn from_reader<R: BufRead>(reader: R) -> Result<EznecPattern, PatternFileError> {
        let mut lines = DataLines::new(reader, ";");
        let mut compass = false;
        let mut slices: Vec<EznecSlice> = vec![];
        let mut current: Option<EznecSlice> = None;

        while let Some((ln, line)) = lines.next_data()? {
            if let Some(rest) = line.strip_prefix("Elevation:") {
                if let Some(done) = current.take() {
                    slices.push(done);
                }
                let elev_deg: f64 = parse_token(rest.trim(), ln)?;
                current = Some(EznecSlice {
                    elev: elev_deg.to_radians(),
                    v: InterpTable::new(),
                    h: InterpTable::new(),
                    tot: InterpTable::new(),
                });
                continue;
            }

            match current.as_mut() {
                None => {
                    // Still in the header block; only the angle
                    // convention matters here.
                    if line.to_ascii_lowercase().contains("compass") {
                        compass = true;
                    }
                }
                Some(slice) => {
                    // Column captions inside a block are skipped; data
                    // rows must carry all four columns.
                    if line
                        .split_whitespace()
                        .next()
                        .map_or(false, |tok| tok.parse::<f64>().is_ok())
                    {
                        let toks = split_exact(&line, 4, ln)?;
                        let az_deg: f64 = parse_token(toks[0], ln)?;
                        let v: f64 = parse_token(toks[1], ln)?;
                        let h: f64 = parse_token(toks[2], ln)?;
                        let tot: f64 = parse_token(toks[3], ln)?;
                        let az = wrap_pi(canonical_deg(az_deg, compass).to_radians());
                        slice.v.insert(az, v);
                        slice.h.insert(az, h);
                        slice.tot.insert(az, tot);
                    }
                }
            }
        }
        if let Some(done) = current.take() {
            slices.push(done);
        }

        if slices.is_empty() {
            return Err(PatternFileError::Parse {
                line: lines.line_no(),
                msg: "no 'Elevation:' blocks found".to_string(),
            });
        }
        if slices.iter().any(|s| s.tot.is_empty()) {
            return Err(PatternFileError::BadGrid(
                "an elevation block has no azimuth rows".to_string(),
            ));
        }
        slices.sort_by(|a, b| a.elev.total_cmp(&b.elev));

        Ok(EznecPattern {
            slices,
            compass,
            valid: true,
            filename: String::new(),
            polarity: Polarity::Unknown,
            cache: MinMaxCache::default(),
            errors: ErrorSlot::default(),
        })
    }

    pub fn pattern_type(&self) -> PatternType {
        PatternType::Eznec
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

    /// Whether the file used the compass azimuth convention.
    pub fn was_compass(&self) -> bool {
        self.compass
    }

    pub fn last_error(&self) -> Option<GainError> {
        self.errors.last()
    }

    pub fn set_error_sink(&mut self, sink: ErrorSink) {
        self.errors.set_sink(sink);
    }

    /// Compute the gain \[dB\] by interpolating azimuth within the two
    /// elevation slices bracketing the look direction, then linearly
    /// between the slices. The column is selected by polarity
    /// (V, H, or total).
    pub fn gain(&self, params: &GainParams) -> f64 {
        match self.try_gain(params) {
            Ok(g) => g,
            Err(e) => {
                self.errors.report(e);
                SMALL_DB
            }
        }
    }

    fn try_gain(&self, params: &GainParams) -> Result<f64, GainError> {
        if !self.valid || self.slices.is_empty() {
            return Err(GainError::InvalidPattern);
        }
        let az = wrap_pi(params.azim);
        let el = wrap_half_pi(params.elev);
        let (i0, i1, t) = self.bracket_slices(el);
        let g0 = self.slices[i0]
            .column(params.polarity)
            .lookup(az)
            .ok_or(GainError::InvalidPattern)?;
        let g1 = self.slices[i1]
            .column(params.polarity)
            .lookup(az)
            .ok_or(GainError::InvalidPattern)?;
        let g = f64::lerp(g0, g1, t);
        let offset = relative_offset(self.stored_max(params.polarity), params.ref_gain);
        Ok((g + offset).max(SMALL_DB))
    }

    /// The slice indices and fraction bracketing an elevation, clamped
    /// to the first/last slice.
    fn bracket_slices(&self, el: f64) -> (usize, usize, f64) {
        let n = self.slices.len();
        if n == 1 || el <= self.slices[0].elev {
            return (0, 0, 0.0);
        }
        if el >= self.slices[n - 1].elev {
            return (n - 1, n - 1, 0.0);
        }
        let i = self.slices.partition_point(|s| s.elev < el);
        let t = (el - self.slices[i - 1].elev) / (self.slices[i].elev - self.slices[i - 1].elev);
        (i - 1, i, t)
    }

    fn stored_max(&self, polarity: Polarity) -> f64 {
        self.slices
            .iter()
            .filter_map(|s| s.column(polarity).extremes())
            .map(|(_, hi)| hi)
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// The gain range of the selected column over every slice.
    pub fn min_max_gain(&self, params: &GainParams) -> (f64, f64) {
        if !self.valid || self.slices.is_empty() {
            self.errors.report(GainError::InvalidPattern);
            return (SMALL_DB, SMALL_DB);
        }
        let key = MinMaxKey::new(params);
        if let Some(cached) = self.cache.get(key) {
            return cached;
        }
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for slice in &self.slices {
            if let Some((s_lo, s_hi)) = slice.column(params.polarity).extremes() {
                lo = lo.min(s_lo);
                hi = hi.max(s_hi);
            }
        }
        let offset = relative_offset(self.stored_max(params.polarity), params.ref_gain);
        let result = ((lo + offset).max(SMALL_DB), (hi + offset).max(SMALL_DB));
        self.cache.store(key, result.0, result.1);
        result
    }
}

/// Canonicalize an on-disk azimuth to the math convention \[degrees\].
fn canonical_deg(az_deg: f64, compass: bool) -> f64 {
    if compass {
        90.0 - az_deg
    } else {
        az_deg
    }
}
