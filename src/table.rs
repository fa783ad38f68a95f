// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Ordered interpolation tables.
//!
//! Pattern files are parsed into [`InterpTable`]s: ordered mappings from
//! a real key (an angle in radians, or a frequency in Hz) to a sample.
//! Lookups clamp to the endpoints rather than extrapolating, and
//! interpolate linearly between the bracketing pair otherwise.
//! [`SymmetricTable`] stores only part of the angular domain and folds
//! query keys into the stored range first.

use std::f64::consts::{FRAC_PI_2, PI};

use num_complex::Complex64;

use crate::angle::wrap_pi;

/// Values that can be linearly interpolated. Complex values interpolate
/// component-wise on the real and imaginary parts.
pub trait Lerp: Copy {
    fn lerp(a: Self, b: Self, t: f64) -> Self;
}

impl Lerp for f64 {
    fn lerp(a: Self, b: Self, t: f64) -> Self {
        a + (b - a) * t
    }
}

impl Lerp for Complex64 {
    fn lerp(a: Self, b: Self, t: f64) -> Self {
        Complex64::new(a.re + (b.re - a.re) * t, a.im + (b.im - a.im) * t)
    }
}

/// An ordered mapping from a real key to a sample, with linear
/// interpolation between neighboring keys.
#[derive(Debug, Clone, Default)]
pub struct InterpTable<V> {
    /// Sample pairs with strictly ascending keys.
    samples: Vec<(f64, V)>,
}

impl<V: Lerp> InterpTable<V> {
    pub fn new() -> InterpTable<V> {
        InterpTable { samples: vec![] }
    }

    /// All formats state their sizes up front, so parsers pre-size.
    pub fn with_capacity(n: usize) -> InterpTable<V> {
        InterpTable {
            samples: Vec::with_capacity(n),
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Insert a sample, keeping keys sorted. Inserting an existing key
    /// overwrites its value.
    pub fn insert(&mut self, key: f64, value: V) {
        let i = self.samples.partition_point(|&(k, _)| k < key);
        if i < self.samples.len() && self.samples[i].0 == key {
            self.samples[i].1 = value;
        } else {
            self.samples.insert(i, (key, value));
        }
    }

    /// Interpolated lookup. Keys outside the stored range return the
    /// nearest endpoint value (no extrapolation). An empty table returns
    /// `None`.
    pub fn lookup(&self, key: f64) -> Option<V> {
        let n = self.samples.len();
        match n {
            0 => None,
            1 => Some(self.samples[0].1),
            _ => {
                if key <= self.samples[0].0 {
                    return Some(self.samples[0].1);
                }
                if key >= self.samples[n - 1].0 {
                    return Some(self.samples[n - 1].1);
                }
                let i = self.samples.partition_point(|&(k, _)| k < key);
                let (k0, v0) = self.samples[i - 1];
                let (k1, v1) = self.samples[i];
                let t = (key - k0) / (k1 - k0);
                Some(V::lerp(v0, v1, t))
            }
        }
    }

    /// The smallest and largest stored keys.
    pub fn bounds(&self) -> Option<(f64, f64)> {
        match self.samples.as_slice() {
            [] => None,
            [only] => Some((only.0, only.0)),
            [first, .., last] => Some((first.0, last.0)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &(f64, V)> {
        self.samples.iter()
    }
}

impl InterpTable<f64> {
    /// The smallest and largest stored values, used to seed min/max gain
    /// scans.
    pub fn extremes(&self) -> Option<(f64, f64)> {
        self.samples
            .iter()
            .map(|&(_, v)| v)
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}

/// How stored samples extend to the full angular domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Symmetry {
    /// Samples cover the whole domain.
    #[default]
    None,
    /// Samples cover non-negative angles; the pattern mirrors about 0.
    Mirror,
    /// Samples cover `[0, π/2]`; the pattern reflects into each quadrant.
    Quadrant,
}

impl Symmetry {
    /// The on-disk symmetry codes are 1, 2 and 4.
    pub fn from_code(code: i64) -> Option<Symmetry> {
        match code {
            1 => Some(Symmetry::None),
            2 => Some(Symmetry::Mirror),
            4 => Some(Symmetry::Quadrant),
            _ => None,
        }
    }

    pub fn code(self) -> i64 {
        match self {
            Symmetry::None => 1,
            Symmetry::Mirror => 2,
            Symmetry::Quadrant => 4,
        }
    }

    /// Fold an angle \[radians\] into the stored range.
    fn fold(self, angle: f64) -> f64 {
        match self {
            Symmetry::None => angle,
            Symmetry::Mirror => angle.abs(),
            Symmetry::Quadrant => {
                let a = wrap_pi(angle).abs();
                if a > FRAC_PI_2 {
                    PI - a
                } else {
                    a
                }
            }
        }
    }
}

/// An [`InterpTable`] over angles plus a symmetry code describing how the
/// stored samples extend to the full domain.
#[derive(Debug, Clone, Default)]
pub struct SymmetricTable {
    table: InterpTable<f64>,
    symmetry: Symmetry,
}

impl SymmetricTable {
    pub fn new(symmetry: Symmetry) -> SymmetricTable {
        SymmetricTable {
            table: InterpTable::new(),
            symmetry,
        }
    }

    pub fn with_capacity(symmetry: Symmetry, n: usize) -> SymmetricTable {
        SymmetricTable {
            table: InterpTable::with_capacity(n),
            symmetry,
        }
    }

    pub fn symmetry(&self) -> Symmetry {
        self.symmetry
    }

    pub fn set_symmetry(&mut self, symmetry: Symmetry) {
        self.symmetry = symmetry;
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn insert(&mut self, angle: f64, value: f64) {
        self.table.insert(angle, value);
    }

    /// Fold the angle per the symmetry code, then interpolate.
    pub fn lookup(&self, angle: f64) -> Option<f64> {
        self.table.lookup(self.symmetry.fold(angle))
    }

    pub fn bounds(&self) -> Option<(f64, f64)> {
        self.table.bounds()
    }

    pub fn extremes(&self) -> Option<(f64, f64)> {
        self.table.extremes()
    }
}
