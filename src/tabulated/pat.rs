// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The `.pat` and `.rel` table formats.
//!
//! Both store a 1-D azimuth cut and a 1-D elevation cut. `.pat` carries
//! an angle-units code (radians or beamwidth multiples) and a symmetry
//! code in its header; `.rel` is always radians, asymmetric and relative
//! (stored maximum of 0 dB).

use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use crate::{
    angle::{wrap_half_pi, wrap_pi},
    constants::SMALL_DB,
    errors::{GainError, PatternFileError},
    table::{InterpTable, SymmetricTable, Symmetry},
    types::{ErrorSink, ErrorSlot, GainParams, MinMaxCache, MinMaxKey, PatternType, Polarity},
};

use super::{combine_gains, parse_token, relative_offset, split_exact, DataLines};

/// How `.pat` table keys are expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AngleUnits {
    /// Keys are angles; queries look up the angle directly.
    #[default]
    Radians,
    /// Keys are beamwidth multiples; queries divide the look angle by the
    /// query beamwidth first.
    Beamwidths,
}

impl AngleUnits {
    /// The on-disk codes are 1 (radians) and 2 (beamwidths).
    pub fn from_code(code: i64) -> Option<AngleUnits> {
        match code {
            1 => Some(AngleUnits::Radians),
            2 => Some(AngleUnits::Beamwidths),
            _ => None,
        }
    }
}

/// An antenna pattern backed by 1-D azimuth and elevation tables
/// (`.pat`), or built programmatically through the `set_*` mutators.
#[derive(Debug, Clone)]
pub struct TablePattern {
    azim: SymmetricTable,
    elev: SymmetricTable,
    units: AngleUnits,
    valid: bool,
    filename: String,
    polarity: Polarity,
    cache: MinMaxCache,
    errors: ErrorSlot,
}

impl Default for TablePattern {
    /// An empty, invalid pattern for programmatic construction.
    fn default() -> TablePattern {
        TablePattern {
            azim: SymmetricTable::default(),
            elev: SymmetricTable::default(),
            units: AngleUnits::Radians,
            valid: false,
            filename: String::new(),
            polarity: Polarity::Unknown,
            cache: MinMaxCache::default(),
            errors: ErrorSlot::default(),
        }
    }
}

impl TablePattern {
    /// Load a `.pat` file.
    pub fn new<T: AsRef<Path>>(file: T) -> Result<TablePattern, PatternFileError> {
        let mut pattern = TablePattern::from_reader(BufReader::new(File::open(&file)?))?;
        pattern.filename = file.as_ref().to_string_lossy().into_owned();
        Ok(pattern)
    }

    pub(crate) fn from_reader<R: BufRead>(reader: R) -> Result<TablePattern, PatternFileError> {
        let mut lines = DataLines::new(reader, "//");

        let (ln, header) = lines.expect_data()?;
        let toks = split_exact(&header, 2, ln)?;
        let units_code: i64 = parse_token(toks[0], ln)?;
        let units = AngleUnits::from_code(units_code).ok_or(PatternFileError::Parse {
            line: ln,
            msg: format!("angle-units code {units_code} is not 1 or 2"),
        })?;
        let sym_code: i64 = parse_token(toks[1], ln)?;
        // Quadrant symmetry (4) is a table capability, not a .pat one.
        let symmetry = match sym_code {
            1 | 2 => Symmetry::from_code(sym_code).unwrap_or_default(),
            other => return Err(PatternFileError::BadSymmetry(other)),
        };

        let azim = read_angle_block(&mut lines, symmetry, units)?;
        let elev = read_angle_block(&mut lines, symmetry, units)?;

        Ok(TablePattern {
            azim,
            elev,
            units,
            valid: true,
            filename: String::new(),
            polarity: Polarity::Unknown,
            cache: MinMaxCache::default(),
            errors: ErrorSlot::default(),
        })
    }

    pub fn pattern_type(&self) -> PatternType {
        PatternType::Table
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

    pub fn angle_units(&self) -> AngleUnits {
        self.units
    }

    pub fn symmetry(&self) -> Symmetry {
        self.azim.symmetry()
    }

    pub fn last_error(&self) -> Option<GainError> {
        self.errors.last()
    }

    pub fn set_error_sink(&mut self, sink: ErrorSink) {
        self.errors.set_sink(sink);
    }

    /// Insert (or overwrite) an azimuth sample \[radians, dB\].
    pub fn set_azim_sample(&mut self, angle_rad: f64, gain_db: f64) {
        self.azim.insert(angle_rad, gain_db);
    }

    /// Insert (or overwrite) an elevation sample \[radians, dB\].
    pub fn set_elev_sample(&mut self, angle_rad: f64, gain_db: f64) {
        self.elev.insert(angle_rad, gain_db);
    }

    pub fn set_angle_units(&mut self, units: AngleUnits) {
        self.units = units;
    }

    pub fn set_symmetry(&mut self, symmetry: Symmetry) {
        self.azim.set_symmetry(symmetry);
        self.elev.set_symmetry(symmetry);
    }

    pub fn set_valid(&mut self, valid: bool) {
        self.valid = valid;
    }

    pub fn set_filename<S: Into<String>>(&mut self, filename: S) {
        self.filename = filename.into();
    }

    /// Compute the gain \[dB\] in the queried direction. Invalid queries
    /// return [`SMALL_DB`] and record the error on the pattern.
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
        if !self.valid || self.azim.is_empty() || self.elev.is_empty() {
            return Err(GainError::InvalidPattern);
        }
        let az = wrap_pi(params.azim);
        let el = wrap_half_pi(params.elev);
        let (key_az, key_el) = match self.units {
            AngleUnits::Radians => (az, el),
            AngleUnits::Beamwidths => {
                if params.hbw <= 0.0 || params.vbw <= 0.0 {
                    return Err(GainError::BadBeamwidth);
                }
                (az / params.hbw, el / params.vbw)
            }
        };
        let g_az = self.azim.lookup(key_az).ok_or(GainError::InvalidPattern)?;
        let g_el = self.elev.lookup(key_el).ok_or(GainError::InvalidPattern)?;
        let combined = combine_gains(g_az, g_el, az, el, params.weighting);
        let offset = relative_offset(self.stored_max(), params.ref_gain);
        Ok((combined + offset).max(SMALL_DB))
    }

    /// The pattern's stored peak: the additive peak of the two cuts.
    fn stored_max(&self) -> f64 {
        let a = self.azim.extremes().map_or(0.0, |(_, hi)| hi);
        let e = self.elev.extremes().map_or(0.0, |(_, hi)| hi);
        a + e
    }

    /// The gain range for these query parameters, via the single-slot
    /// cache.
    pub fn min_max_gain(&self, params: &GainParams) -> (f64, f64) {
        let key = MinMaxKey::new(params);
        if let Some(cached) = self.cache.get(key) {
            return cached;
        }
        match self.scan(params) {
            Ok((lo, hi)) => {
                self.cache.store(key, lo, hi);
                (lo, hi)
            }
            Err(e) => {
                self.errors.report(e);
                (SMALL_DB, SMALL_DB)
            }
        }
    }

    fn scan(&self, params: &GainParams) -> Result<(f64, f64), GainError> {
        if !self.valid {
            return Err(GainError::InvalidPattern);
        }
        let (a_lo, a_hi) = self.azim.extremes().ok_or(GainError::InvalidPattern)?;
        let (e_lo, e_hi) = self.elev.extremes().ok_or(GainError::InvalidPattern)?;
        let offset = relative_offset(self.stored_max(), params.ref_gain);
        Ok(combined_extremes(
            (a_lo, a_hi),
            (e_lo, e_hi),
            params.weighting,
            offset,
        ))
    }
}

/// An antenna pattern backed by explicitly-relative 1-D tables (`.rel`).
#[derive(Debug, Clone)]
pub struct RelativeTablePattern {
    azim: InterpTable<f64>,
    elev: InterpTable<f64>,
    valid: bool,
    filename: String,
    polarity: Polarity,
    cache: MinMaxCache,
    errors: ErrorSlot,
}

impl RelativeTablePattern {
    /// Load a `.rel` file.
    pub fn new<T: AsRef<Path>>(file: T) -> Result<RelativeTablePattern, PatternFileError> {
        let mut pattern = RelativeTablePattern::from_reader(BufReader::new(File::open(&file)?))?;
        pattern.filename = file.as_ref().to_string_lossy().into_owned();
        Ok(pattern)
    }

    pub(crate) fn from_reader<R: BufRead>(
        reader: R,
    ) -> Result<RelativeTablePattern, PatternFileError> {
        let mut lines = DataLines::new(reader, "//");

        let (ln, header) = lines.expect_data()?;
        let toks = split_exact(&header, 2, ln)?;
        let azim_count: usize = parse_token(toks[0], ln)?;
        let elev_count: usize = parse_token(toks[1], ln)?;

        let azim = read_samples(&mut lines, azim_count)?;
        let elev = read_samples(&mut lines, elev_count)?;

        Ok(RelativeTablePattern {
            azim,
            elev,
            valid: true,
            filename: String::new(),
            polarity: Polarity::Unknown,
            cache: MinMaxCache::default(),
            errors: ErrorSlot::default(),
        })
    }

    pub fn pattern_type(&self) -> PatternType {
        PatternType::RelativeTable
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

    /// Compute the gain \[dB\] in the queried direction. The stored
    /// tables are relative, so the caller's reference gain is always
    /// added.
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
        if !self.valid {
            return Err(GainError::InvalidPattern);
        }
        let az = wrap_pi(params.azim);
        let el = wrap_half_pi(params.elev);
        let g_az = self.azim.lookup(az).ok_or(GainError::InvalidPattern)?;
        let g_el = self.elev.lookup(el).ok_or(GainError::InvalidPattern)?;
        let combined = combine_gains(g_az, g_el, az, el, params.weighting);
        Ok((combined + params.ref_gain).max(SMALL_DB))
    }

    pub fn min_max_gain(&self, params: &GainParams) -> (f64, f64) {
        let key = MinMaxKey::new(params);
        if let Some(cached) = self.cache.get(key) {
            return cached;
        }
        let extremes = self
            .azim
            .extremes()
            .zip(self.elev.extremes())
            .filter(|_| self.valid);
        match extremes {
            Some((a, e)) => {
                let (lo, hi) = combined_extremes(a, e, params.weighting, params.ref_gain);
                self.cache.store(key, lo, hi);
                (lo, hi)
            }
            None => {
                self.errors.report(GainError::InvalidPattern);
                (SMALL_DB, SMALL_DB)
            }
        }
    }
}

/// A conservative envelope for the combined min/max: the additive
/// extremes are exact for unweighted queries; weighted queries blend the
/// two cuts, so the envelope also covers each cut alone (the weighted
/// boresight case degenerates to the sum).
fn combined_extremes(
    (a_lo, a_hi): (f64, f64),
    (e_lo, e_hi): (f64, f64),
    weighting: bool,
    offset: f64,
) -> (f64, f64) {
    let (lo, hi) = if weighting {
        (
            (a_lo + e_lo).min(a_lo).min(e_lo),
            (a_hi + e_hi).max(a_hi).max(e_hi),
        )
    } else {
        (a_lo + e_lo, a_hi + e_hi)
    };
    ((lo + offset).max(SMALL_DB), (hi + offset).max(SMALL_DB))
}

/// Read `count` of `angle_deg gain_db`, enforcing ascending file order.
/// For beamwidth-units tables the first column is a beamwidth multiple
/// and is stored unconverted.
fn read_block_samples<R: BufRead>(
    lines: &mut DataLines<R>,
    count: usize,
    units: AngleUnits,
) -> Result<Vec<(f64, f64)>, PatternFileError> {
    let mut out = Vec::with_capacity(count);
    let mut prev: Option<f64> = None;
    for i in 0..count {
        let (ln, line) = match lines.next_data()? {
            Some(x) => x,
            None => {
                return Err(PatternFileError::TruncatedFile {
                    expected: count,
                    got: i,
                })
            }
        };
        let toks = split_exact(&line, 2, ln)?;
        let raw: f64 = parse_token(toks[0], ln)?;
        let gain_db: f64 = parse_token(toks[1], ln)?;
        if let Some(p) = prev {
            if raw <= p {
                return Err(PatternFileError::KeysNotAscending { line: ln });
            }
        }
        prev = Some(raw);
        let key = match units {
            AngleUnits::Radians => raw.to_radians(),
            AngleUnits::Beamwidths => raw,
        };
        out.push((key, gain_db));
    }
    Ok(out)
}

fn read_angle_block<R: BufRead>(
    lines: &mut DataLines<R>,
    symmetry: Symmetry,
    units: AngleUnits,
) -> Result<SymmetricTable, PatternFileError> {
    let (ln, count_line) = lines.expect_data()?;
    let count: usize = parse_token(split_exact(&count_line, 1, ln)?[0], ln)?;
    if count == 0 {
        return Err(PatternFileError::BadGrid("empty angle block".to_string()));
    }
    let mut table = SymmetricTable::with_capacity(symmetry, count);
    for (key, gain_db) in read_block_samples(lines, count, units)? {
        table.insert(key, gain_db);
    }
    Ok(table)
}

fn read_samples<R: BufRead>(
    lines: &mut DataLines<R>,
    count: usize,
) -> Result<InterpTable<f64>, PatternFileError> {
    if count == 0 {
        return Err(PatternFileError::BadGrid("empty angle block".to_string()));
    }
    let mut table = InterpTable::with_capacity(count);
    for (key, gain_db) in read_block_samples(lines, count, AngleUnits::Radians)? {
        table.insert(key, gain_db);
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::io::Cursor;

    /// A mirrored all-zero azimuth cut (36 samples) with a short
    /// elevation cut.
    const ZERO_PAT: &str = "\
// test pattern
1 2
36
";

    fn zero_pat_text() -> String {
        let mut s = ZERO_PAT.to_string();
        for i in 0..36 {
            s.push_str(&format!("{} 0.0\n", -180 + i * 10));
        }
        s.push_str("5\n-90 0\n-45 0\n0 0\n45 0\n90 0\n");
        s
    }

    fn zero_pat() -> TablePattern {
        TablePattern::from_reader(Cursor::new(zero_pat_text())).unwrap()
    }

    #[test]
    fn parse_pat_header_and_blocks() {
        let pat = zero_pat();
        assert!(pat.is_valid());
        assert_eq!(pat.pattern_type(), PatternType::Table);
        assert_eq!(pat.angle_units(), AngleUnits::Radians);
        assert_eq!(pat.symmetry(), Symmetry::Mirror);
    }

    #[test]
    fn all_zero_table_returns_ref_gain_exactly() {
        let pat = zero_pat();
        let mut params = GainParams {
            ref_gain: 17.5,
            ..Default::default()
        };
        for az_deg in [-180, -95, -10, 0, 35, 180] {
            params.azim = f64::from(az_deg).to_radians();
            params.elev = 0.0;
            assert_eq!(pat.gain(&params), 17.5);
        }
    }

    #[test]
    fn mirror_symmetry_makes_gain_even_in_azimuth() {
        let text = "\
1 2
3
0 0.0
90 -10.0
180 -30.0
2
0 0.0
90 -20.0
";
        let pat = TablePattern::from_reader(Cursor::new(text)).unwrap();
        for az_deg in [10.0, 45.0, 90.0, 135.0] {
            let p1 = GainParams {
                azim: az_deg * 1.0_f64.to_radians(),
                ..Default::default()
            };
            let p2 = GainParams {
                azim: -p1.azim,
                ..p1
            };
            assert_eq!(pat.gain(&p1).to_bits(), pat.gain(&p2).to_bits());
        }
        // And the cut itself interpolates.
        let p = GainParams {
            azim: 45.0_f64.to_radians(),
            ..Default::default()
        };
        // Relative table: stored max is 0, ref_gain (0 here) is added.
        assert_abs_diff_eq!(pat.gain(&p), -5.0, epsilon = 1e-12);
    }

    #[test]
    fn beamwidth_units_scale_by_query_beamwidth() {
        let text = "\
2 1
3
-2 -20.0
0 0.0
2 -20.0
3
-2 -12.0
0 0.0
2 -12.0
";
        let pat = TablePattern::from_reader(Cursor::new(text)).unwrap();
        assert_eq!(pat.angle_units(), AngleUnits::Beamwidths);
        // One beamwidth off boresight is half-way to the -20 dB point at
        // two beamwidths, whatever the beamwidth actually is.
        for hbw_deg in [2.0_f64, 10.0] {
            let p = GainParams {
                azim: hbw_deg.to_radians(),
                hbw: hbw_deg.to_radians(),
                vbw: 5.0_f64.to_radians(),
                ..Default::default()
            };
            assert_abs_diff_eq!(pat.gain(&p), -10.0, epsilon = 1e-9);
        }

        // Without beamwidths the query cannot be scaled.
        let p = GainParams::default();
        assert_eq!(pat.gain(&p), SMALL_DB);
        assert_eq!(pat.last_error(), Some(GainError::BadBeamwidth));
    }

    #[test]
    fn truncated_file_is_named() {
        let text = "1 1\n4\n0 0\n10 0\n";
        match TablePattern::from_reader(Cursor::new(text)) {
            Err(PatternFileError::TruncatedFile { expected: 4, got: 2 }) => {}
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn bad_symmetry_code_is_rejected() {
        let text = "1 4\n2\n0 0\n10 0\n2\n0 0\n10 0\n";
        assert!(matches!(
            TablePattern::from_reader(Cursor::new(text)),
            Err(PatternFileError::BadSymmetry(4))
        ));
    }

    #[test]
    fn descending_keys_are_rejected() {
        let text = "1 1\n3\n0 0\n10 0\n5 0\n";
        assert!(matches!(
            TablePattern::from_reader(Cursor::new(text)),
            Err(PatternFileError::KeysNotAscending { .. })
        ));
    }

    #[test]
    fn non_numeric_token_is_a_parse_error() {
        let text = "1 1\n2\n0 zero\n10 0\n";
        assert!(matches!(
            TablePattern::from_reader(Cursor::new(text)),
            Err(PatternFileError::Parse { .. })
        ));
    }

    #[test]
    fn programmatic_construction_with_mutators() {
        let mut pat = TablePattern::default();
        assert_eq!(pat.gain(&GainParams::default()), SMALL_DB);
        assert_eq!(pat.last_error(), Some(GainError::InvalidPattern));

        for deg in (-180..=180).step_by(10) {
            let a = f64::from(deg).to_radians();
            pat.set_azim_sample(a, -(f64::from(deg) / 30.0).powi(2));
        }
        for deg in (-90..=90).step_by(10) {
            let e = f64::from(deg).to_radians();
            pat.set_elev_sample(e, -(f64::from(deg) / 15.0).powi(2));
        }
        pat.set_symmetry(Symmetry::None);
        pat.set_angle_units(AngleUnits::Radians);
        pat.set_filename("custom.pat");
        pat.set_valid(true);

        assert_eq!(pat.filename(), "custom.pat");
        let p = GainParams {
            azim: 30.0_f64.to_radians(),
            ..Default::default()
        };
        // Stored max is 0 on both cuts, so this is a relative table.
        assert_abs_diff_eq!(pat.gain(&p), -1.0, epsilon = 1e-9);

        pat.set_valid(false);
        assert_eq!(pat.gain(&p), SMALL_DB);
    }

    #[test]
    fn weighting_cross_weights_the_cuts() {
        let mut pat = TablePattern::default();
        pat.set_azim_sample(-3.2, -40.0);
        pat.set_azim_sample(0.0, 0.0);
        pat.set_azim_sample(3.2, -40.0);
        pat.set_elev_sample(-1.6, -10.0);
        pat.set_elev_sample(0.0, 0.0);
        pat.set_elev_sample(1.6, -10.0);
        pat.set_valid(true);

        // In the elevation plane (el = 0) the azimuth sample's weight is
        // |el|/(|az|+|el|) = 0, so the weighted gain is the boresight
        // elevation sample.
        let p = GainParams {
            azim: 1.6,
            weighting: true,
            ..Default::default()
        };
        assert_abs_diff_eq!(pat.gain(&p), 0.0, epsilon = 1e-12);
        // Unweighted adds the cuts instead.
        let p2 = GainParams {
            weighting: false,
            ..p
        };
        assert_abs_diff_eq!(pat.gain(&p2), -20.0, epsilon = 1e-12);

        // Off both axes the cuts blend by the opposite angle's share:
        // w_az = 0.8/2.4 on the -20 dB azimuth sample, the rest on the
        // -5 dB elevation sample.
        let p3 = GainParams {
            azim: 1.6,
            elev: 0.8,
            weighting: true,
            ..Default::default()
        };
        assert_abs_diff_eq!(pat.gain(&p3), -10.0, epsilon = 1e-9);
    }

    #[test]
    fn min_max_bounds_and_cache() {
        let pat = {
            let text = "\
1 1
3
-90 -25.0
0 0.0
90 -25.0
3
-45 -10.0
0 0.0
45 -10.0
";
            TablePattern::from_reader(Cursor::new(text)).unwrap()
        };
        let params = GainParams {
            ref_gain: 8.0,
            ..Default::default()
        };
        let (lo, hi) = pat.min_max_gain(&params);
        assert_abs_diff_eq!(lo, 8.0 - 35.0);
        assert_abs_diff_eq!(hi, 8.0);
        // Same key: served from the cache (and equal).
        assert_eq!(pat.min_max_gain(&params), (lo, hi));

        for az_deg in (-180..=180).step_by(15) {
            for el_deg in (-90..=90).step_by(15) {
                let p = GainParams {
                    azim: f64::from(az_deg).to_radians(),
                    elev: f64::from(el_deg).to_radians(),
                    ..params
                };
                let g = pat.gain(&p);
                assert!(g >= lo - 1e-9 && g <= hi + 1e-9);
            }
        }
    }

    #[test]
    fn rel_parse_and_offset() {
        let text = "\
// relative pattern
3 3
-90 -20.0
0 0.0
90 -20.0
-45 -12.0
0 0.0
45 -12.0
";
        let rel = RelativeTablePattern::from_reader(Cursor::new(text)).unwrap();
        assert_eq!(rel.pattern_type(), PatternType::RelativeTable);
        assert!(rel.is_valid());

        let p = GainParams {
            ref_gain: 30.0,
            ..Default::default()
        };
        assert_eq!(rel.gain(&p), 30.0);
        let p2 = GainParams {
            azim: 45.0_f64.to_radians(),
            ..p
        };
        assert_abs_diff_eq!(rel.gain(&p2), 30.0 - 10.0, epsilon = 1e-9);

        let (lo, hi) = rel.min_max_gain(&p);
        assert_abs_diff_eq!(hi, 30.0);
        assert_abs_diff_eq!(lo, 30.0 - 32.0);
    }

    #[test]
    fn rel_header_counts_must_match_data() {
        let text = "3 1\n0 0\n10 0\n";
        assert!(matches!(
            RelativeTablePattern::from_reader(Cursor::new(text)),
            Err(PatternFileError::KeysNotAscending { .. }) | Err(PatternFileError::TruncatedFile { .. })
        ));
    }
}
