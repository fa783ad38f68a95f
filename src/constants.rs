// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Useful constants.

/// The "no signal" sentinel \[dB\]. Chosen sufficiently negative that the
/// equivalent linear power is indistinguishable from zero.
pub const SMALL_DB: f64 = -300.0;

/// Linear power corresponding to [`SMALL_DB`]; the floor used when
/// converting linear power to dB so that zero power maps to [`SMALL_DB`].
pub(crate) const SMALL_LINEAR: f64 = 1e-30;

/// First side-lobe level used when a query does not supply one \[dB\].
/// This is the first side lobe of an unweighted sinc² aperture.
pub const DEFAULT_FIRST_LOBE_DB: f64 = -13.2;

/// Back-lobe level used when a query does not supply one \[dB\].
pub const DEFAULT_BACK_LOBE_DB: f64 = -30.0;

/// 10·log10(2): the half-power point \[dB\].
pub(crate) const HALF_POWER_DB: f64 = 3.010299956639812;

/// Tolerance below which a table's maximum counts as 0 dB, making the
/// table "relative" and subject to the reference-gain offset.
pub(crate) const RELATIVE_MAX_EPSILON: f64 = 1e-9;
