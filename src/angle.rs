// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Angle wrapping and dB↔linear conversions used throughout the crate.
//!
//! Every public query normalizes its look direction through these
//! functions before any table lookup or shape evaluation, so all
//! internal code can assume azimuths in `(-π, π]` and elevations in
//! `[-π/2, π/2]`.

use std::f64::consts::{FRAC_PI_2, PI, TAU};

use crate::constants::{SMALL_DB, SMALL_LINEAR};

/// Wrap an angle into `(-π, π]` \[radians\].
pub fn wrap_pi(angle: f64) -> f64 {
    // One-shot reduction for pathologically large inputs; the loop below
    // then runs at most twice.
    let mut a = if angle.abs() > 64.0 * TAU {
        angle.rem_euclid(TAU)
    } else {
        angle
    };
    while a > PI {
        a -= TAU;
    }
    while a <= -PI {
        a += TAU;
    }
    a
}

/// Wrap an angle into `[0, 2π)` \[radians\].
pub fn wrap_two_pi(angle: f64) -> f64 {
    let r = angle.rem_euclid(TAU);
    // rem_euclid can round up to exactly 2π for tiny negative inputs.
    if r >= TAU {
        0.0
    } else {
        r
    }
}

/// Fold an elevation into `[-π/2, π/2]` \[radians\], reflecting past the
/// poles (an elevation of 100° is the same direction as 80°).
pub fn wrap_half_pi(angle: f64) -> f64 {
    let a = wrap_pi(angle);
    if a > FRAC_PI_2 {
        PI - a
    } else if a < -FRAC_PI_2 {
        -PI - a
    } else {
        a
    }
}

/// Convert a dB gain to a linear power ratio.
pub fn db_to_linear(db: f64) -> f64 {
    10.0_f64.powf(db / 10.0)
}

/// Convert a linear power ratio to dB. Zero (or negative) power maps to
/// [`SMALL_DB`] rather than -∞.
pub fn linear_to_db(linear: f64) -> f64 {
    if linear <= SMALL_LINEAR {
        SMALL_DB
    } else {
        10.0 * linear.log10()
    }
}

/// Convert a voltage (field) ratio to dB, i.e. `20·log10(|v|)`.
pub fn voltage_to_db(voltage: f64) -> f64 {
    linear_to_db(voltage * voltage)
}
