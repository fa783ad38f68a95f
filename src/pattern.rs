// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
The polymorphic pattern value and the file-loading factory.

The pattern-format list is closed, so [`AntennaPattern`] is a plain enum
rather than a trait object; every capability dispatches over the
variants. Analytic patterns are constructed directly (see
[`AnalyticPattern`]); tabulated patterns come from [`load_pattern_file`],
which selects a parser from the file suffix.
 */

use std::path::Path;

use rayon::prelude::*;

use crate::{
    analytic::AnalyticPattern,
    errors::{GainError, PatternFileError},
    tabulated::{
        BiLinearPattern, CruisePattern, EznecPattern, MonopulsePattern, NsmaPattern,
        RelativeTablePattern, TablePattern, XfdtdPattern,
    },
    types::{ErrorSink, GainParams, PatternType, Polarity},
};

/// Any antenna pattern the library can evaluate.
#[derive(Debug, Clone)]
pub enum AntennaPattern {
    Analytic(AnalyticPattern),
    Table(TablePattern),
    RelativeTable(RelativeTablePattern),
    Cruise(CruisePattern),
    Monopulse(MonopulsePattern),
    BiLinear(BiLinearPattern),
    Nsma(NsmaPattern),
    Eznec(EznecPattern),
    Xfdtd(XfdtdPattern),
}

macro_rules! dispatch {
    ($self:expr, $p:ident => $call:expr) => {
        match $self {
            AntennaPattern::Analytic($p) => $call,
            AntennaPattern::Table($p) => $call,
            AntennaPattern::RelativeTable($p) => $call,
            AntennaPattern::Cruise($p) => $call,
            AntennaPattern::Monopulse($p) => $call,
            AntennaPattern::BiLinear($p) => $call,
            AntennaPattern::Nsma($p) => $call,
            AntennaPattern::Eznec($p) => $call,
            AntennaPattern::Xfdtd($p) => $call,
        }
    };
}

impl AntennaPattern {
    /// Compute the gain \[dB\] for one query. Queries never fail: invalid
    /// inputs yield [`SMALL_DB`](crate::SMALL_DB) and record a
    /// [`GainError`] on the pattern.
    pub fn gain(&self, params: &GainParams) -> f64 {
        dispatch!(self, p => p.gain(params))
    }

    /// The gain range for these query parameters.
    pub fn min_max_gain(&self, params: &GainParams) -> (f64, f64) {
        dispatch!(self, p => p.min_max_gain(params))
    }

    pub fn pattern_type(&self) -> PatternType {
        dispatch!(self, p => p.pattern_type())
    }

    /// Whether construction succeeded. A valid pattern can still return
    /// [`SMALL_DB`](crate::SMALL_DB) for a given query.
    pub fn is_valid(&self) -> bool {
        dispatch!(self, p => p.is_valid())
    }

    /// The file this pattern was loaded from (empty for analytic and
    /// programmatic patterns).
    pub fn filename(&self) -> &str {
        dispatch!(self, p => p.filename())
    }

    pub fn polarity(&self) -> Polarity {
        dispatch!(self, p => p.polarity())
    }

    /// The most recent query error, if any.
    pub fn last_error(&self) -> Option<GainError> {
        dispatch!(self, p => p.last_error())
    }

    pub fn set_error_sink(&mut self, sink: ErrorSink) {
        dispatch!(self, p => p.set_error_sink(sink))
    }

    /// Compute the gains for many queries. This is basically a wrapper
    /// around [`AntennaPattern::gain`] that computes the queries in
    /// parallel. The number of parallel threads used can be controlled
    /// by setting `RAYON_NUM_THREADS`.
    pub fn gains(&self, queries: &[GainParams]) -> Vec<f64> {
        let mut results = vec![0.0; queries.len()];
        self.gains_inner(queries, &mut results);
        results
    }

    /// The same as [`AntennaPattern::gains`] but uses pre-allocated
    /// memory. `results` must be at least as long as `queries`.
    pub fn gains_inner(&self, queries: &[GainParams], results: &mut [f64]) {
        queries
            .par_iter()
            .zip(results.par_iter_mut())
            .for_each(|(q, r)| {
                *r = self.gain(q);
            });
    }
}

impl From<AnalyticPattern> for AntennaPattern {
    fn from(p: AnalyticPattern) -> AntennaPattern {
        AntennaPattern::Analytic(p)
    }
}

impl From<TablePattern> for AntennaPattern {
    fn from(p: TablePattern) -> AntennaPattern {
        AntennaPattern::Table(p)
    }
}

impl From<RelativeTablePattern> for AntennaPattern {
    fn from(p: RelativeTablePattern) -> AntennaPattern {
        AntennaPattern::RelativeTable(p)
    }
}

/// Load an antenna pattern file, selecting the parser from the
/// (lower-cased) file suffix. `freq_hint_mhz` becomes the default query
/// frequency for the frequency-indexed formats.
pub fn load_pattern_file<T: AsRef<Path>>(
    path: T,
    freq_hint_mhz: f64,
) -> Result<AntennaPattern, PatternFileError> {
    load_pattern_file_with_sink(path, freq_hint_mhz, None)
}

/// Like [`load_pattern_file`], wiring an error sink into the returned
/// pattern: every query error is passed to `sink` as well as being
/// recorded on the pattern.
pub fn load_pattern_file_with_sink<T: AsRef<Path>>(
    path: T,
    freq_hint_mhz: f64,
    sink: Option<ErrorSink>,
) -> Result<AntennaPattern, PatternFileError> {
    let path = path.as_ref();
    let suffix = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let mut pattern = match suffix.as_str() {
        "pat" => AntennaPattern::Table(TablePattern::new(path)?),
        "rel" => AntennaPattern::RelativeTable(RelativeTablePattern::new(path)?),
        "cru" => AntennaPattern::Cruise(CruisePattern::new(path, freq_hint_mhz)?),
        "mon" => AntennaPattern::Monopulse(MonopulsePattern::new(path, freq_hint_mhz)?),
        "bil" => AntennaPattern::BiLinear(BiLinearPattern::new(path, freq_hint_mhz)?),
        "nsm" => AntennaPattern::Nsma(NsmaPattern::new(path)?),
        "ezn" => AntennaPattern::Eznec(EznecPattern::new(path)?),
        "xfd" | "uan" => AntennaPattern::Xfdtd(XfdtdPattern::new(path)?),
        _ => return Err(PatternFileError::UnknownFormat(suffix)),
    };
    if let Some(sink) = sink {
        pattern.set_error_sink(sink);
    }
    log::debug!(
        "loaded {} pattern from {}",
        pattern.pattern_type(),
        path.display()
    );
    Ok(pattern)
}

/// Load the pattern named by the `ANTPAT_FILE` environment variable,
/// with an optional frequency hint in `ANTPAT_FREQ_MHZ`.
pub fn load_pattern_file_from_env() -> Result<AntennaPattern, PatternFileError> {
    let path = std::env::var("ANTPAT_FILE")?;
    let freq_hint_mhz = std::env::var("ANTPAT_FREQ_MHZ")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0.0);
    load_pattern_file(path, freq_hint_mhz)
}
