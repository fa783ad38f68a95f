// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The NSMA `.nsm` format: multi-polarization azimuth/elevation cuts.
//!
//! The first seven header lines are opaque free text (manufacturer,
//! model, comment, FCC id, revision, date, antenna id), followed by the
//! frequency range, mid-band gain, half-power beamwidth and up to eight
//! channel blocks keyed by polarization pair and cut plane. Channel
//! gains are stored relative (0 dB at the peak).

use std::{
    collections::HashMap,
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use crate::{
    angle::{wrap_half_pi, wrap_pi},
    constants::SMALL_DB,
    errors::{GainError, PatternFileError},
    table::InterpTable,
    types::{ErrorSink, ErrorSlot, GainParams, MinMaxCache, MinMaxKey, PatternType, Polarity},
};

use super::{combine_gains, parse_sample_line, parse_token, split_exact, DataLines};

/// A transmit/receive polarization channel label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolChannel {
    Hh,
    Hv,
    Vv,
    Vh,
}

impl PolChannel {
    fn from_token(tok: &str) -> Option<PolChannel> {
        match tok.to_ascii_uppercase().as_str() {
            "HH" => Some(PolChannel::Hh),
            "HV" => Some(PolChannel::Hv),
            "VV" => Some(PolChannel::Vv),
            "VH" => Some(PolChannel::Vh),
            _ => None,
        }
    }
}

/// Which principal cut a channel block describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Plane {
    Az,
    El,
}

impl Plane {
    fn from_token(tok: &str) -> Option<Plane> {
        match tok.to_ascii_uppercase().as_str() {
            "AZ" => Some(Plane::Az),
            "EL" => Some(Plane::El),
            _ => None,
        }
    }
}

/// The NSMA descriptive header.
#[derive(Debug, Clone, Default)]
pub struct NsmaHeader {
    pub manufacturer: String,
    pub model: String,
    pub comment: String,
    pub fcc_id: String,
    pub revision: String,
    pub date: String,
    pub antenna_id: String,
    pub freq_low_mhz: f64,
    pub freq_high_mhz: f64,
    pub mid_band_gain_db: f64,
    pub half_power_beamwidth_deg: f64,
}

/// An antenna pattern loaded from an NSMA `.nsm` file.
#[derive(Debug, Clone)]
pub struct NsmaPattern {
    header: NsmaHeader,
    channels: HashMap<(PolChannel, Plane), InterpTable<f64>>,
    valid: bool,
    filename: String,
    polarity: Polarity,
    cache: MinMaxCache,
    errors: ErrorSlot,
}

impl NsmaPattern {
    /// Load a `.nsm` file.
    pub fn new<T: AsRef<Path>>(file: T) -> Result<NsmaPattern, PatternFileError> {
        let mut pattern = NsmaPattern::from_reader(BufReader::new(File::open(&file)?))?;
        pattern.filename = file.as_ref().to_string_lossy().into_owned();
        Ok(pattern)
    }

    pub(crate) fn from_reader<R: BufRead>(reader: R) -> Result<NsmaPattern, PatternFileError> {
        let mut lines = DataLines::new(reader, "#");

        // The seven descriptive lines are opaque: taken verbatim, never
        // comment-filtered.
        let mut text_fields = Vec::with_capacity(7);
        for _ in 0..7 {
            match lines.next_raw()? {
                Some(line) => text_fields.push(line.trim().to_string()),
                None => {
                    return Err(PatternFileError::Parse {
                        line: lines.line_no(),
                        msg: "NSMA header ended early".to_string(),
                    })
                }
            }
        }

        let (ln, freq_line) = lines.expect_data()?;
        let toks = split_exact(&freq_line, 2, ln)?;
        let freq_low_mhz: f64 = parse_token(toks[0], ln)?;
        let freq_high_mhz: f64 = parse_token(toks[1], ln)?;

        let (ln, gain_line) = lines.expect_data()?;
        let mid_band_gain_db: f64 = parse_token(split_exact(&gain_line, 1, ln)?[0], ln)?;

        let (ln, bw_line) = lines.expect_data()?;
        let half_power_beamwidth_deg: f64 = parse_token(split_exact(&bw_line, 1, ln)?[0], ln)?;
        if half_power_beamwidth_deg <= 0.0 {
            return Err(PatternFileError::BadBeamwidth(half_power_beamwidth_deg));
        }

        let (ln, count_line) = lines.expect_data()?;
        let pattern_count: usize = parse_token(split_exact(&count_line, 1, ln)?[0], ln)?;

        let mut channels = HashMap::with_capacity(pattern_count);
        for _ in 0..pattern_count {
            let (ln, header) = lines.expect_data()?;
            let toks = split_exact(&header, 3, ln)?;
            let pol = PolChannel::from_token(toks[0]).ok_or(PatternFileError::Parse {
                line: ln,
                msg: format!("'{}' is not an NSMA polarization", toks[0]),
            })?;
            let plane = Plane::from_token(toks[1]).ok_or(PatternFileError::Parse {
                line: ln,
                msg: format!("'{}' is not an NSMA cut plane", toks[1]),
            })?;
            let count: usize = parse_token(toks[2], ln)?;
            let mut table = InterpTable::with_capacity(count);
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
                let (angle, gain_db) = parse_sample_line(&line, ln)?;
                if let Some(p) = prev {
                    if angle <= p {
                        return Err(PatternFileError::KeysNotAscending { line: ln });
                    }
                }
                prev = Some(angle);
                table.insert(angle, gain_db);
            }
            channels.insert((pol, plane), table);
        }

        let mut fields = text_fields.into_iter();
        let header = NsmaHeader {
            manufacturer: fields.next().unwrap_or_default(),
            model: fields.next().unwrap_or_default(),
            comment: fields.next().unwrap_or_default(),
            fcc_id: fields.next().unwrap_or_default(),
            revision: fields.next().unwrap_or_default(),
            date: fields.next().unwrap_or_default(),
            antenna_id: fields.next().unwrap_or_default(),
            freq_low_mhz,
            freq_high_mhz,
            mid_band_gain_db,
            half_power_beamwidth_deg,
        };

        Ok(NsmaPattern {
            header,
            channels,
            valid: true,
            filename: String::new(),
            polarity: Polarity::Unknown,
            cache: MinMaxCache::default(),
            errors: ErrorSlot::default(),
        })
    }

    pub fn pattern_type(&self) -> PatternType {
        PatternType::Nsma
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

    pub fn header(&self) -> &NsmaHeader {
        &self.header
    }

    pub fn last_error(&self) -> Option<GainError> {
        self.errors.last()
    }

    pub fn set_error_sink(&mut self, sink: ErrorSink) {
        self.errors.set_sink(sink);
    }

    /// The stored channel for a query polarization. Cross-polarized
    /// queries select the cross channels; circular and unknown
    /// polarizations fall back to HH.
    fn channel_for(polarity: Polarity) -> PolChannel {
        match polarity {
            Polarity::Vertical => PolChannel::Vv,
            Polarity::HorzVert => PolChannel::Hv,
            Polarity::VertHorz => PolChannel::Vh,
            Polarity::Horizontal
            | Polarity::RightCircular
            | Polarity::LeftCircular
            | Polarity::Unknown => PolChannel::Hh,
        }
    }

    fn cuts(&self, params: &GainParams) -> Result<(&InterpTable<f64>, &InterpTable<f64>), GainError> {
        let ch = NsmaPattern::channel_for(params.polarity);
        let az = self
            .channels
            .get(&(ch, Plane::Az))
            .ok_or(GainError::ChannelMissing(params.polarity))?;
        let el = self
            .channels
            .get(&(ch, Plane::El))
            .ok_or(GainError::ChannelMissing(params.polarity))?;
        Ok((az, el))
    }

    /// Compute the gain \[dB\] in the queried direction for the query
    /// polarization. Channel tables are relative, so the reference gain
    /// is always added.
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
        let (az_cut, el_cut) = self.cuts(params)?;
        let g_az = az_cut.lookup(az).ok_or(GainError::InvalidPattern)?;
        let g_el = el_cut.lookup(el).ok_or(GainError::InvalidPattern)?;
        let combined = combine_gains(g_az, g_el, az, el, params.weighting);
        Ok((combined + params.ref_gain).max(SMALL_DB))
    }

    /// The gain range of the selected polarization channel.
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
        let (az_cut, el_cut) = self.cuts(params)?;
        let (a_lo, a_hi) = az_cut.extremes().ok_or(GainError::InvalidPattern)?;
        let (e_lo, e_hi) = el_cut.extremes().ok_or(GainError::InvalidPattern)?;
        let (lo, hi) = if params.weighting {
            (
                (a_lo + e_lo).min(a_lo).min(e_lo),
                (a_hi + e_hi).max(a_hi).max(e_hi),
            )
        } else {
            (a_lo + e_lo, a_hi + e_hi)
        };
        Ok((
            (lo + params.ref_gain).max(SMALL_DB),
            (hi + params.ref_gain).max(SMALL_DB),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::io::Cursor;

    fn nsma_text() -> String {
        let mut s = String::new();
        s.push_str("Acme Antennas\n");
        s.push_str("AA-2400\n");
        s.push_str("panel antenna, test fixture\n");
        s.push_str("FCC-1234\n");
        s.push_str("B\n");
        s.push_str("2024-06-01\n");
        s.push_str("AA-2400-0001\n");
        s.push_str("2300 2500\n");
        s.push_str("17.1\n");
        s.push_str("18.0\n");
        s.push_str("6\n");
        // HH: a gentle azimuth cut, flat elevation cut.
        s.push_str("HH AZ 3\n-180 -30\n0 0\n180 -30\n");
        s.push_str("HH EL 3\n-90 -20\n0 0\n90 -20\n");
        // VV: a deeper azimuth cut.
        s.push_str("VV AZ 3\n-180 -40\n0 0\n180 -40\n");
        s.push_str("VV EL 3\n-90 -20\n0 0\n90 -20\n");
        // HV: cross-pol, uniformly down 25 dB.
        s.push_str("HV AZ 3\n-180 -25\n0 -25\n180 -25\n");
        s.push_str("HV EL 3\n-90 -25\n0 -25\n90 -25\n");
        s
    }

    fn nsma() -> NsmaPattern {
        NsmaPattern::from_reader(Cursor::new(nsma_text())).unwrap()
    }

    #[test]
    fn header_fields_are_parsed() {
        let n = nsma();
        let h = n.header();
        assert_eq!(h.manufacturer, "Acme Antennas");
        assert_eq!(h.model, "AA-2400");
        assert_eq!(h.fcc_id, "FCC-1234");
        assert_eq!(h.antenna_id, "AA-2400-0001");
        assert_eq!(h.freq_low_mhz, 2300.0);
        assert_eq!(h.freq_high_mhz, 2500.0);
        assert_abs_diff_eq!(h.mid_band_gain_db, 17.1);
        assert_abs_diff_eq!(h.half_power_beamwidth_deg, 18.0);
    }

    #[test]
    fn polarity_selects_the_channel_pair() {
        let n = nsma();
        let base = GainParams {
            azim: 90.0_f64.to_radians(),
            ref_gain: 17.1,
            ..Default::default()
        };
        let hh = GainParams {
            polarity: Polarity::Horizontal,
            ..base
        };
        let vv = GainParams {
            polarity: Polarity::Vertical,
            ..base
        };
        assert_abs_diff_eq!(n.gain(&hh), 17.1 - 15.0, epsilon = 1e-9);
        assert_abs_diff_eq!(n.gain(&vv), 17.1 - 20.0, epsilon = 1e-9);
    }

    #[test]
    fn cross_polarization_uses_the_cross_channels() {
        let n = nsma();
        let p = GainParams {
            polarity: Polarity::HorzVert,
            ref_gain: 17.1,
            ..Default::default()
        };
        // The HV channel is uniformly -25 dB in both cuts.
        assert_abs_diff_eq!(n.gain(&p), 17.1 - 50.0, epsilon = 1e-9);
    }

    #[test]
    fn missing_channel_is_reported() {
        let n = nsma();
        let p = GainParams {
            polarity: Polarity::VertHorz,
            ..Default::default()
        };
        assert_eq!(n.gain(&p), SMALL_DB);
        assert_eq!(
            n.last_error(),
            Some(GainError::ChannelMissing(Polarity::VertHorz))
        );
        assert_eq!(n.min_max_gain(&p), (SMALL_DB, SMALL_DB));
    }

    #[test]
    fn circular_polarizations_fall_back_to_hh() {
        let n = nsma();
        let hh = GainParams {
            polarity: Polarity::Horizontal,
            azim: 0.7,
            elev: 0.2,
            ..Default::default()
        };
        let rc = GainParams {
            polarity: Polarity::RightCircular,
            ..hh
        };
        assert_eq!(n.gain(&hh), n.gain(&rc));
    }

    #[test]
    fn min_max_bounds_the_selected_channel() {
        let n = nsma();
        let base = GainParams {
            polarity: Polarity::Vertical,
            ref_gain: 17.1,
            ..Default::default()
        };
        let (lo, hi) = n.min_max_gain(&base);
        assert_abs_diff_eq!(hi, 17.1, epsilon = 1e-9);
        assert_abs_diff_eq!(lo, 17.1 - 60.0, epsilon = 1e-9);
        for az_deg in (-180..=180).step_by(20) {
            for el_deg in (-90..=90).step_by(15) {
                let p = GainParams {
                    azim: f64::from(az_deg).to_radians(),
                    elev: f64::from(el_deg).to_radians(),
                    ..base
                };
                let g = n.gain(&p);
                assert!(g >= lo - 1e-9 && g <= hi + 1e-9);
            }
        }
    }

    #[test]
    fn short_header_is_an_error() {
        let text = "Acme\nAA-1\n";
        assert!(matches!(
            NsmaPattern::from_reader(Cursor::new(text)),
            Err(PatternFileError::Parse { .. })
        ));
    }

    #[test]
    fn unknown_polarization_token_is_an_error() {
        let mut s = nsma_text();
        s.push_str("XX AZ 1\n0 0\n");
        // pattern_count still says 6, so the extra block is ignored;
        // bump the count to trip the parser on the bad block.
        let s = s.replacen("\n6\n", "\n7\n", 1);
        assert!(matches!(
            NsmaPattern::from_reader(Cursor::new(s)),
            Err(PatternFileError::Parse { .. })
        ));
    }
}
