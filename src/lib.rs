// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Antenna gain patterns for radar, electronic-warfare and link-budget
//! simulation.
//!
//! A pattern answers one question: what is the gain of this antenna when
//! looking in direction (azimuth, elevation) at frequency f under
//! polarization p? Patterns are either closed-form
//! ([`AnalyticPattern`]: Gauss, cosecant-squared, sin(x)/x, pedestal,
//! omni) or loaded from one of eight tabulated file formats through
//! [`load_pattern_file`].
//!
//! ```no_run
//! use antpat::{load_pattern_file, AnalyticPattern, GainParams};
//!
//! let radar = load_pattern_file("radar_antenna.pat", 2400.0)?;
//! let gain = radar.gain(&GainParams {
//!     azim: 10.0_f64.to_radians(),
//!     ref_gain: 25.0,
//!     ..Default::default()
//! });
//!
//! let horn = AnalyticPattern::new_gauss();
//! let boresight = horn.gain(&GainParams {
//!     ref_gain: 25.0,
//!     hbw: 3.0_f64.to_radians(),
//!     vbw: 5.0_f64.to_radians(),
//!     ..Default::default()
//! });
//! # Ok::<(), antpat::PatternFileError>(())
//! ```
//!
//! Loading is all-or-nothing; queries never fail (invalid queries return
//! [`SMALL_DB`] and record a [`GainError`] on the pattern). A
//! constructed pattern is immutable apart from its internal caches and
//! safe for concurrent readers.

pub mod analytic;
mod angle;
mod constants;
mod errors;
mod pattern;
mod table;
pub mod tabulated;
mod types;

pub use analytic::{AnalyticKind, AnalyticPattern};
pub use angle::{db_to_linear, linear_to_db, wrap_half_pi, wrap_pi, wrap_two_pi};
pub use constants::{DEFAULT_BACK_LOBE_DB, DEFAULT_FIRST_LOBE_DB, SMALL_DB};
pub use errors::{GainError, PatternFileError};
pub use pattern::{
    load_pattern_file, load_pattern_file_from_env, load_pattern_file_with_sink, AntennaPattern,
};
pub use table::{InterpTable, Lerp, Symmetry, SymmetricTable};
pub use types::{ErrorSink, GainParams, PatternType, Polarity, UnknownPatternType};
