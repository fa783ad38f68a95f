// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The XFDTD `.xfd`/`.uan` format: a spherical far-field grid.
//!
//! A UAN-style header between `begin_<parameters>` and
//! `end_<parameters>` declares the phi and theta axes; data rows carry
//! `phi theta gain_theta gain_phi phase_theta phase_phi`. Directions map
//! to antenna coordinates as `az = phi`, `el = π/2 − theta`. The phase
//! columns are parsed for shape but not used by gain queries.

use std::{
    collections::HashMap,
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use ndarray::Array2;

use crate::{
    angle::{db_to_linear, linear_to_db, wrap_half_pi, wrap_pi, wrap_two_pi},
    constants::SMALL_DB,
    errors::{GainError, PatternFileError},
    table::Lerp,
    types::{ErrorSink, ErrorSlot, GainParams, MinMaxCache, MinMaxKey, PatternType, Polarity},
};

use super::{parse_token, relative_offset, split_exact, DataLines, RegularGrid};

/// Which gain channel a query polarization reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Channel {
    Theta,
    Phi,
    Combined,
}

/// An antenna pattern loaded from an XFDTD far-field export.
#[derive(Debug, Clone)]
pub struct XfdtdPattern {
    phi: RegularGrid,
    theta: RegularGrid,
    /// `[phi_index, theta_index]` dB grids.
    gain_theta: Array2<f64>,
    gain_phi: Array2<f64>,
    valid: bool,
    filename: String,
    polarity: Polarity,
    cache: MinMaxCache,
    errors: ErrorSlot,
}

impl XfdtdPattern {
    /// Load an `.xfd`/`.uan` file.
    pub fn new<T: AsRef<Path>>(file: T) -> Result<XfdtdPattern, PatternFileError> {
        let mut pattern = XfdtdPattern::from_reader(BufReader::new(File::open(&file)?))?;
        pattern.filename = file.as_ref().to_string_lossy().into_owned();
        Ok(pattern)
    }

    pub(crate) fn from_reader<R: BufRead>(reader: R) -> Result<XfdtdPattern, PatternFileError> {
        let mut lines = DataLines::new(reader, "#");

        // Skip to the parameter block, then collect `key value` pairs
        // until it closes. Unknown keys are allowed and ignored.
        loop {
            let (ln, line) = lines.expect_data()?;
            if line.to_ascii_lowercase().starts_with("begin_") {
                break;
            }
            if lines.line_no() > 64 {
                return Err(PatternFileError::Parse {
                    line: ln,
                    msg: "no begin_<parameters> block found".to_string(),
                });
            }
        }
        let mut header: HashMap<String, String> = HashMap::new();
        loop {
            let (_ln, line) = lines.expect_data()?;
            if line.to_ascii_lowercase().starts_with("end_") {
                break;
            }
            let mut toks = line.split_whitespace();
            if let Some(key) = toks.next() {
                header.insert(
                    key.to_ascii_lowercase(),
                    toks.collect::<Vec<_>>().join(" "),
                );
            }
        }

        let axis = |name_min: &str, name_max: &str, name_inc: &str| {
            let get = |key: &str| -> Result<f64, PatternFileError> {
                let raw = header.get(key).ok_or_else(|| {
                    PatternFileError::BadGrid(format!("header is missing '{key}'"))
                })?;
                parse_token(raw, 0)
            };
            RegularGrid::new(
                get(name_min)?.to_radians(),
                get(name_max)?.to_radians(),
                get(name_inc)?.to_radians(),
            )
        };
        let phi = axis("phi_min", "phi_max", "phi_inc")?;
        let theta = axis("theta_min", "theta_max", "theta_inc")?;

        let mut gain_theta = Array2::from_elem((phi.len(), theta.len()), f64::NAN);
        let mut gain_phi = Array2::from_elem((phi.len(), theta.len()), f64::NAN);
        let total = phi.len() * theta.len();
        for i in 0..total {
            let (ln, row) = match lines.next_data()? {
                Some(x) => x,
                None => {
                    return Err(PatternFileError::TruncatedFile {
                        expected: total,
                        got: i,
                    })
                }
            };
            let toks = split_exact(&row, 6, ln)?;
            let phi_deg: f64 = parse_token(toks[0], ln)?;
            let theta_deg: f64 = parse_token(toks[1], ln)?;
            let g_theta: f64 = parse_token(toks[2], ln)?;
            let g_phi: f64 = parse_token(toks[3], ln)?;
            let _phase_theta: f64 = parse_token(toks[4], ln)?;
            let _phase_phi: f64 = parse_token(toks[5], ln)?;
            let pi_idx = grid_index(&phi, phi_deg.to_radians()).ok_or(PatternFileError::Parse {
                line: ln,
                msg: format!("phi {phi_deg} is not on the declared grid"),
            })?;
            let ti_idx =
                grid_index(&theta, theta_deg.to_radians()).ok_or(PatternFileError::Parse {
                    line: ln,
                    msg: format!("theta {theta_deg} is not on the declared grid"),
                })?;
            gain_theta[[pi_idx, ti_idx]] = g_theta;
            gain_phi[[pi_idx, ti_idx]] = g_phi;
        }
        if gain_theta.iter().any(|g| g.is_nan()) {
            return Err(PatternFileError::BadGrid(
                "data rows do not cover the declared grid".to_string(),
            ));
        }

        Ok(XfdtdPattern {
            phi,
            theta,
            gain_theta,
            gain_phi,
            valid: true,
            filename: String::new(),
            polarity: Polarity::Unknown,
            cache: MinMaxCache::default(),
            errors: ErrorSlot::default(),
        })
    }

    pub fn pattern_type(&self) -> PatternType {
        PatternType::Xfdtd
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

    fn channel_for(polarity: Polarity) -> Channel {
        match polarity {
            Polarity::Vertical => Channel::Theta,
            Polarity::Horizontal => Channel::Phi,
            _ => Channel::Combined,
        }
    }

    /// A cell of the selected channel \[dB\].
    fn cell(&self, channel: Channel, p: usize, t: usize) -> f64 {
        match channel {
            Channel::Theta => self.gain_theta[[p, t]],
            Channel::Phi => self.gain_phi[[p, t]],
            Channel::Combined => linear_to_db(
                db_to_linear(self.gain_theta[[p, t]]) + db_to_linear(self.gain_phi[[p, t]]),
            ),
        }
    }

    /// Map a canonical azimuth onto the file's phi axis (files use
    /// either `[0, 360]` or `[-180, 180]` axes).
    fn phi_key(&self, az: f64) -> f64 {
        let p = wrap_two_pi(az);
        if self.phi.contains(p) {
            p
        } else {
            wrap_pi(az)
        }
    }

    /// Compute the gain \[dB\] in the queried direction for the query
    /// polarization.
    pub fn gain(&self, params: &GainParams) -> f64 {
        if !self.valid {
            self.errors.report(GainError::InvalidPattern);
            return SMALL_DB;
        }
        let az = wrap_pi(params.azim);
        let el = wrap_half_pi(params.elev);
        let channel = XfdtdPattern::channel_for(params.polarity);

        let (p0, p1, tp) = self.phi.weights(self.phi_key(az));
        let (t0, t1, tt) = self.theta.weights(std::f64::consts::FRAC_PI_2 - el);
        let low = f64::lerp(self.cell(channel, p0, t0), self.cell(channel, p1, t0), tp);
        let high = f64::lerp(self.cell(channel, p0, t1), self.cell(channel, p1, t1), tp);
        let g = f64::lerp(low, high, tt);

        let offset = relative_offset(self.stored_max(channel), params.ref_gain);
        (g + offset).max(SMALL_DB)
    }

    fn stored_max(&self, channel: Channel) -> f64 {
        let mut hi = f64::NEG_INFINITY;
        for p in 0..self.phi.len() {
            for t in 0..self.theta.len() {
                hi = hi.max(self.cell(channel, p, t));
            }
        }
        hi
    }

    /// The gain range of the selected channel over the whole grid.
    pub fn min_max_gain(&self, params: &GainParams) -> (f64, f64) {
        if !self.valid {
            self.errors.report(GainError::InvalidPattern);
            return (SMALL_DB, SMALL_DB);
        }
        let key = MinMaxKey::new(params);
        if let Some(cached) = self.cache.get(key) {
            return cached;
        }
        let channel = XfdtdPattern::channel_for(params.polarity);
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for p in 0..self.phi.len() {
            for t in 0..self.theta.len() {
                let g = self.cell(channel, p, t);
                lo = lo.min(g);
                hi = hi.max(g);
            }
        }
        let offset = relative_offset(hi, params.ref_gain);
        let result = ((lo + offset).max(SMALL_DB), (hi + offset).max(SMALL_DB));
        self.cache.store(key, result.0, result.1);
        result
    }
}

/// The index of an on-grid value, or `None` if it is off-grid.
fn grid_index(grid: &RegularGrid, x: f64) -> Option<usize> {
    let (i0, i1, t) = grid.weights(x);
    if t < 1e-6 && grid.contains(x) {
        Some(i0)
    } else if t > 1.0 - 1e-6 {
        Some(i1)
    } else {
        None
    }
}
