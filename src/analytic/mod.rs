// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Closed-form antenna pattern models.
//!
//! These compute gain from beamwidths and lobe levels supplied with each
//! query; nothing is loaded from disk. All models return
//! `ref_gain + shape(az, el)` where `shape ≤ 0` dB, with the first
//! side-lobe level acting as a floor in the forward hemisphere and the
//! back-lobe level acting as a floor behind the antenna.


use std::f64::consts::{FRAC_PI_2, PI};

use crate::{
    angle::{linear_to_db, wrap_half_pi, wrap_pi},
    constants::{HALF_POWER_DB, SMALL_DB},
    errors::GainError,
    types::{ErrorSink, ErrorSlot, GainParams, PatternType, Polarity},
};

/// Which closed-form shape a pattern evaluates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalyticKind {
    /// Constant gain in every direction.
    Omni,
    /// Gaussian main beam.
    Gauss,
    /// Cosecant-squared elevation fan over a Gaussian azimuth cut.
    CscSq,
    /// sin(x)/x main beam with a forced first side-lobe level.
    SinXx,
    /// Flat pedestal falling linearly to the back-lobe level.
    Pedestal,
}

impl AnalyticKind {
    pub fn pattern_type(self) -> PatternType {
        match self {
            AnalyticKind::Omni => PatternType::Omni,
            AnalyticKind::Gauss => PatternType::Gauss,
            AnalyticKind::CscSq => PatternType::CscSq,
            AnalyticKind::SinXx => PatternType::SinXx,
            AnalyticKind::Pedestal => PatternType::Pedestal,
        }
    }

    /// Whether the shape uses the query beamwidths at all (everything but
    /// Omni does).
    fn needs_beamwidths(self) -> bool {
        !matches!(self, AnalyticKind::Omni)
    }
}

/// A closed-form antenna pattern.
#[derive(Debug, Clone)]
pub struct AnalyticPattern {
    kind: AnalyticKind,
    /// Recorded for callers; the closed-form shapes are
    /// polarization-independent.
    polarity: Polarity,
    errors: ErrorSlot,
}

impl AnalyticPattern {
    pub fn new(kind: AnalyticKind) -> AnalyticPattern {
        AnalyticPattern {
            kind,
            polarity: Polarity::Unknown,
            errors: ErrorSlot::default(),
        }
    }

    pub fn new_omni() -> AnalyticPattern {
        AnalyticPattern::new(AnalyticKind::Omni)
    }

    pub fn new_gauss() -> AnalyticPattern {
        AnalyticPattern::new(AnalyticKind::Gauss)
    }

    pub fn new_csc_sq() -> AnalyticPattern {
        AnalyticPattern::new(AnalyticKind::CscSq)
    }

    pub fn new_sin_xx() -> AnalyticPattern {
        AnalyticPattern::new(AnalyticKind::SinXx)
    }

    pub fn new_pedestal() -> AnalyticPattern {
        AnalyticPattern::new(AnalyticKind::Pedestal)
    }

    pub fn with_polarity(mut self, polarity: Polarity) -> AnalyticPattern {
        self.polarity = polarity;
        self
    }

    pub fn set_error_sink(&mut self, sink: ErrorSink) {
        self.errors.set_sink(sink);
    }

    pub fn kind(&self) -> AnalyticKind {
        self.kind
    }

    pub fn pattern_type(&self) -> PatternType {
        self.kind.pattern_type()
    }

    /// Analytic patterns need no data, so they are always valid.
    pub fn is_valid(&self) -> bool {
        true
    }

    /// Analytic patterns are not backed by a file.
    pub fn filename(&self) -> &str {
        ""
    }

    pub fn polarity(&self) -> Polarity {
        self.polarity
    }

    pub fn last_error(&self) -> Option<GainError> {
        self.errors.last()
    }

    /// Compute the gain \[dB\] in the queried direction.
    pub fn gain(&self, params: &GainParams) -> f64 {
        if self.kind.needs_beamwidths() && (params.hbw <= 0.0 || params.vbw <= 0.0) {
            self.errors.report(GainError::BadBeamwidth);
            return SMALL_DB;
        }

        let az = wrap_pi(params.azim);
        let el = wrap_half_pi(params.elev);
        let first_lobe = params.first_lobe_db();
        let back_lobe = params.back_lobe_db();

        let shape = match self.kind {
            AnalyticKind::Omni => 0.0,
            AnalyticKind::Gauss => {
                gauss_shape(az, el, params.hbw, params.vbw).max(lobe_floor(az, first_lobe, back_lobe))
            }
            AnalyticKind::CscSq => cscsq_shape(az, el, params.hbw, params.vbw, first_lobe, back_lobe),
            AnalyticKind::SinXx => {
                let s = sinxx_axis_shape(az, params.hbw, first_lobe)
                    + sinxx_axis_shape(el, params.vbw, first_lobe);
                // Two side-lobe axes can stack; the overall floor is the
                // same one min_max_gain reports.
                s.max(back_lobe.max(first_lobe - 60.0))
            }
            AnalyticKind::Pedestal => {
                let s = pedestal_axis_shape(az.abs(), params.hbw / 2.0, PI, back_lobe)
                    + pedestal_axis_shape(el.abs(), params.vbw / 2.0, FRAC_PI_2, back_lobe);
                s.max(back_lobe)
            }
        };

        (params.ref_gain + shape).max(SMALL_DB)
    }

    /// The gain range over all directions for these query parameters.
    /// Analytic models compute this in closed form; nothing is scanned.
    pub fn min_max_gain(&self, params: &GainParams) -> (f64, f64) {
        if self.kind.needs_beamwidths() && (params.hbw <= 0.0 || params.vbw <= 0.0) {
            self.errors.report(GainError::BadBeamwidth);
            return (SMALL_DB, SMALL_DB);
        }
        let floor = match self.kind {
            AnalyticKind::Omni => 0.0,
            // Whichever lobe floor is lower bounds the whole sphere.
            AnalyticKind::Gauss | AnalyticKind::CscSq => {
                params.first_lobe_db().min(params.back_lobe_db())
            }
            AnalyticKind::SinXx => params.back_lobe_db().max(params.first_lobe_db() - 60.0),
            AnalyticKind::Pedestal => params.back_lobe_db(),
        };
        (params.ref_gain + floor, params.ref_gain)
    }
}

/// The lobe level acting as a floor for a given azimuth: the first
/// side-lobe level in front, the back-lobe level behind.
fn lobe_floor(az: f64, first_lobe: f64, back_lobe: f64) -> f64 {
    if az.abs() > FRAC_PI_2 {
        back_lobe
    } else {
        first_lobe
    }
}

/// Gaussian main beam: down 3 dB at one beamwidth off boresight in each
/// principal plane.
fn gauss_shape(az: f64, el: f64, hbw: f64, vbw: f64) -> f64 {
    -HALF_POWER_DB * ((az / hbw).powi(2) + (el / vbw).powi(2))
}

/// Cosecant-squared fan: Gaussian below the csc² knee at `el = vbw`,
/// `csc²` roll-off above it (anchored at the -3 dB point so the
/// transition is continuous), Gaussian azimuth cut throughout.
fn cscsq_shape(az: f64, el: f64, hbw: f64, vbw: f64, first_lobe: f64, back_lobe: f64) -> f64 {
    let az_shape = -HALF_POWER_DB * (az / hbw).powi(2);
    let in_fan = el >= vbw && el <= FRAC_PI_2;
    let el_shape = if in_fan {
        -HALF_POWER_DB - 10.0 * (el.sin() / vbw.sin()).powi(2).log10()
    } else {
        -HALF_POWER_DB * (el / vbw).powi(2)
    };
    // The csc² fan is allowed to roll all the way to the back-lobe level;
    // outside it the usual side-lobe floor applies.
    let floor = if in_fan {
        back_lobe
    } else {
        lobe_floor(az, first_lobe, back_lobe)
    };
    (az_shape + el_shape).max(floor)
}

/// One axis of the sin(x)/x shape. Inside the first null the raw
/// sinc level is used (floored at the first side-lobe level); outside,
/// the side-lobe region is forced to the first side-lobe level.
fn sinxx_axis_shape(angle: f64, bw: f64, first_lobe: f64) -> f64 {
    let x = PI * angle / bw;
    if x.abs() < PI {
        let s = sinc(x);
        linear_to_db(s * s).max(first_lobe)
    } else {
        first_lobe
    }
}

/// One axis of the pedestal shape: flat inside the half-width, then a
/// linear fall reaching the back-lobe level at the edge of the domain.
fn pedestal_axis_shape(angle_abs: f64, half_width: f64, domain_edge: f64, back_lobe: f64) -> f64 {
    if angle_abs <= half_width || half_width >= domain_edge {
        0.0
    } else {
        back_lobe * (angle_abs - half_width) / (domain_edge - half_width)
    }
}

fn sinc(x: f64) -> f64 {
    if x.abs() < 1e-12 {
        1.0
    } else {
        x.sin() / x
    }
}
