// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Errors associated with loading and querying antenna patterns.

Loading a pattern file is all-or-nothing: any [`PatternFileError`] aborts
the load and no partial pattern is returned. Gain queries never fail;
instead a [`GainError`] is recorded on the pattern's last-error slot and
the query returns [`SMALL_DB`](crate::SMALL_DB).
 */

use thiserror::Error;

use crate::types::Polarity;

/// Errors raised while loading a pattern file. These abort the load.
#[derive(Error, Debug)]
pub enum PatternFileError {
    /// The file suffix matched no known pattern format.
    #[error("'{0}' is not a recognized antenna pattern file suffix")]
    UnknownFormat(String),

    /// An error associated with reading the file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A malformed header, non-numeric token or wrong token count.
    #[error("Parse error at line {line}: {msg}")]
    Parse { line: usize, msg: String },

    /// The file ended before the counts in its header were satisfied.
    #[error("File ended early: expected {expected} data lines, got {got}")]
    TruncatedFile { expected: usize, got: usize },

    /// Table keys must be strictly ascending.
    #[error("Angle keys are not strictly ascending at line {line}")]
    KeysNotAscending { line: usize },

    /// A symmetry code outside 1/2/4 (or outside what the format
    /// allows).
    #[error("Symmetry code {0} is not valid here")]
    BadSymmetry(i64),

    /// A beamwidth or angular step that must be positive was not.
    #[error("Beamwidth/step must be positive, got {0}")]
    BadBeamwidth(f64),

    /// An inconsistent grid definition (counts, limits and steps
    /// disagree, or an axis has fewer than two points).
    #[error("Bad grid: {0}")]
    BadGrid(String),

    /// An error associated with the ANTPAT_FILE environment variable.
    #[error("Problem with the ANTPAT_FILE variable: {0}")]
    EnvVar(#[from] std::env::VarError),
}

/// Errors raised by gain queries. These never abort: the query returns
/// [`SMALL_DB`](crate::SMALL_DB) and the error lands in the pattern's
/// last-error slot (and the injected error sink, if one was configured
/// at load time).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GainError {
    /// The query frequency lies outside the pattern's frequency axis and
    /// the format does not allow clamping.
    #[error("Frequency {freq} Hz is outside the supported range [{min}, {max}] Hz")]
    UnsupportedFrequency { freq: f64, min: f64, max: f64 },

    /// The requested polarization has no stored channel.
    #[error("No pattern channel stored for polarization {0}")]
    ChannelMissing(Polarity),

    /// A beamwidth needed by the query was not positive.
    #[error("Query beamwidth must be positive")]
    BadBeamwidth,

    /// The pattern was never populated (e.g. programmatic table with no
    /// samples, or `set_valid(false)`).
    #[error("Pattern holds no usable data")]
    InvalidPattern,
}
