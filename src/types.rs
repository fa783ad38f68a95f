// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Generic types.

use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    str::FromStr,
    sync::{Arc, Mutex, PoisonError},
};

use thiserror::Error;

use crate::{
    constants::{DEFAULT_BACK_LOBE_DB, DEFAULT_FIRST_LOBE_DB},
    errors::GainError,
};

/// Antenna polarization. For the four-letter channel labels (HH, HV, …)
/// the first letter is transmit and the second receive; `HorzVert` and
/// `VertHorz` select the cross-polarized channels of formats that store
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Polarity {
    Horizontal,
    Vertical,
    RightCircular,
    LeftCircular,
    HorzVert,
    VertHorz,
    #[default]
    Unknown,
}

impl std::fmt::Display for Polarity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Polarity::Horizontal => "HORIZONTAL",
                Polarity::Vertical => "VERTICAL",
                Polarity::RightCircular => "RIGHTCIRC",
                Polarity::LeftCircular => "LEFTCIRC",
                Polarity::HorzVert => "HORZVERT",
                Polarity::VertHorz => "VERTHORZ",
                Polarity::Unknown => "UNKNOWN",
            }
        )
    }
}

/// Returned when a pattern-type or polarity name has no corresponding
/// value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("'{0}' does not name a known antenna pattern type or polarity")]
pub struct UnknownPatternType(pub String);

impl FromStr for Polarity {
    type Err = UnknownPatternType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "HORIZONTAL" | "HH" => Ok(Polarity::Horizontal),
            "VERTICAL" | "VV" => Ok(Polarity::Vertical),
            "RIGHTCIRC" => Ok(Polarity::RightCircular),
            "LEFTCIRC" => Ok(Polarity::LeftCircular),
            "HORZVERT" | "HV" => Ok(Polarity::HorzVert),
            "VERTHORZ" | "VH" => Ok(Polarity::VertHorz),
            "UNKNOWN" => Ok(Polarity::Unknown),
            _ => Err(UnknownPatternType(s.to_string())),
        }
    }
}

/// Discriminants of [`AntennaPattern`](crate::AntennaPattern).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternType {
    Gauss,
    CscSq,
    SinXx,
    Pedestal,
    Omni,
    Table,
    RelativeTable,
    Cruise,
    Monopulse,
    BiLinear,
    Nsma,
    Eznec,
    Xfdtd,
}

impl PatternType {
    /// The canonical name, also produced by `Display`.
    pub fn name(self) -> &'static str {
        match self {
            PatternType::Gauss => "GAUSS",
            PatternType::CscSq => "CSCSQ",
            PatternType::SinXx => "SINXX",
            PatternType::Pedestal => "PEDESTAL",
            PatternType::Omni => "OMNI",
            PatternType::Table => "TABLE",
            PatternType::RelativeTable => "RELATIVE_TABLE",
            PatternType::Cruise => "CRUISE",
            PatternType::Monopulse => "MONOPULSE",
            PatternType::BiLinear => "BILINEAR",
            PatternType::Nsma => "NSMA",
            PatternType::Eznec => "EZNEC",
            PatternType::Xfdtd => "XFDTD",
        }
    }
}

impl std::fmt::Display for PatternType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for PatternType {
    type Err = UnknownPatternType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GAUSS" => Ok(PatternType::Gauss),
            "CSCSQ" => Ok(PatternType::CscSq),
            "SINXX" => Ok(PatternType::SinXx),
            "PEDESTAL" => Ok(PatternType::Pedestal),
            "OMNI" => Ok(PatternType::Omni),
            "TABLE" => Ok(PatternType::Table),
            "RELATIVE_TABLE" => Ok(PatternType::RelativeTable),
            "CRUISE" => Ok(PatternType::Cruise),
            "MONOPULSE" => Ok(PatternType::Monopulse),
            "BILINEAR" => Ok(PatternType::BiLinear),
            "NSMA" => Ok(PatternType::Nsma),
            "EZNEC" => Ok(PatternType::Eznec),
            "XFDTD" => Ok(PatternType::Xfdtd),
            _ => Err(UnknownPatternType(s.to_string())),
        }
    }
}

/// Inputs to a gain computation.
///
/// Angles are radians and may be any value; queries normalize them into
/// azimuth `(-π, π]` and elevation `[-π/2, π/2]`. `first_lobe` and
/// `back_lobe` are sentinel-driven: a supplied value below 0 dB is used
/// as-is, anything else selects the library defaults.
#[derive(Debug, Clone, Copy)]
pub struct GainParams {
    /// Look azimuth \[radians\].
    pub azim: f64,
    /// Look elevation \[radians\].
    pub elev: f64,
    pub polarity: Polarity,
    /// Horizontal half-power beamwidth \[radians\].
    pub hbw: f64,
    /// Vertical half-power beamwidth \[radians\].
    pub vbw: f64,
    /// The caller's maximum-gain reference \[dB\]. Analytic models center
    /// on this; relative tables (stored maximum of 0 dB) add it as an
    /// offset.
    pub ref_gain: f64,
    /// First side-lobe level \[dB relative to boresight\].
    pub first_lobe: f64,
    /// Back-lobe level \[dB relative to boresight\].
    pub back_lobe: f64,
    /// Query frequency \[Hz\]; 0 selects the frequency hint recorded at
    /// load time for frequency-indexed formats.
    pub freq: f64,
    /// Blend azimuth and elevation samples by angular distance instead of
    /// adding them.
    pub weighting: bool,
    /// Monopulse channel selector: `false` = sum, `true` = difference.
    pub delta: bool,
}

impl Default for GainParams {
    fn default() -> GainParams {
        GainParams {
            azim: 0.0,
            elev: 0.0,
            polarity: Polarity::Unknown,
            hbw: 0.0,
            vbw: 0.0,
            ref_gain: 0.0,
            first_lobe: 0.0,
            back_lobe: 0.0,
            freq: 0.0,
            weighting: false,
            delta: false,
        }
    }
}

impl GainParams {
    /// The effective first side-lobe level \[dB\].
    pub fn first_lobe_db(&self) -> f64 {
        if self.first_lobe < 0.0 {
            self.first_lobe
        } else {
            DEFAULT_FIRST_LOBE_DB
        }
    }

    /// The effective back-lobe level \[dB\].
    pub fn back_lobe_db(&self) -> f64 {
        if self.back_lobe < 0.0 {
            self.back_lobe
        } else {
            DEFAULT_BACK_LOBE_DB
        }
    }
}

/// A special key used to tell whether the cached min/max pair is still
/// valid for a query.
///
/// It hashes the query parameters the min/max scan depends on. If those
/// parameters are re-used, the same hash is generated and the cached pair
/// can be returned without re-scanning the tables.
#[derive(Hash, Debug, Clone, Copy, Eq, PartialEq, Default)]
pub(crate) struct MinMaxKey(u64);

impl MinMaxKey {
    pub(crate) fn new(params: &GainParams) -> MinMaxKey {
        let mut hasher = DefaultHasher::new();
        // We can't hash f64 values, but we can hash their bits.
        params.hbw.to_bits().hash(&mut hasher);
        params.vbw.to_bits().hash(&mut hasher);
        params.polarity.hash(&mut hasher);
        params.freq.to_bits().hash(&mut hasher);
        params.delta.hash(&mut hasher);
        params.weighting.hash(&mut hasher);
        params.ref_gain.to_bits().hash(&mut hasher);
        MinMaxKey(hasher.finish())
    }
}

/// A single-slot min/max gain cache. Workloads typically re-use the last
/// beamwidth, so one entry (the last-seen key) is enough; the slot is
/// mutex-guarded so patterns stay safe for concurrent readers.
#[derive(Debug, Default)]
pub(crate) struct MinMaxCache(Mutex<Option<(MinMaxKey, f64, f64)>>);

impl MinMaxCache {
    pub(crate) fn get(&self, key: MinMaxKey) -> Option<(f64, f64)> {
        let slot = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        match *slot {
            Some((cached, lo, hi)) if cached == key => Some((lo, hi)),
            _ => None,
        }
    }

    pub(crate) fn store(&self, key: MinMaxKey, lo: f64, hi: f64) {
        let mut slot = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = Some((key, lo, hi));
    }
}

impl Clone for MinMaxCache {
    fn clone(&self) -> MinMaxCache {
        let slot = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        MinMaxCache(Mutex::new(*slot))
    }
}

/// A callback invoked with every query error, injectable at load time.
pub type ErrorSink = Arc<dyn Fn(&GainError) + Send + Sync>;

/// Per-pattern last-error slot plus the optional injected sink. Query
/// errors land here instead of aborting the query.
#[derive(Default)]
pub(crate) struct ErrorSlot {
    last: Mutex<Option<GainError>>,
    sink: Option<ErrorSink>,
}

impl ErrorSlot {
    pub(crate) fn set_sink(&mut self, sink: ErrorSink) {
        self.sink = Some(sink);
    }

    pub(crate) fn report(&self, err: GainError) {
        log::warn!("antenna pattern query: {err}");
        if let Some(sink) = &self.sink {
            sink(&err);
        }
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        *last = Some(err);
    }

    pub(crate) fn last(&self) -> Option<GainError> {
        self.last
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl std::fmt::Debug for ErrorSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorSlot")
            .field("last", &self.last)
            .field("sink", &self.sink.as_ref().map(|_| "..."))
            .finish()
    }
}

impl Clone for ErrorSlot {
    fn clone(&self) -> ErrorSlot {
        ErrorSlot {
            last: Mutex::new(self.last()),
            sink: self.sink.clone(),
        }
    }
}
