//! # Visibility calibration
//!
//! Move the phase reference of a [`VisibilitySet`] from the prior location to the
//! phase center of the map, and apply the static per-subcollimator gain/phase
//! correction:
//!
//! ```text
//! V_cal = g · V · exp(−2πi (u, v)·(p₀ − c)) · exp(i φ_cal)
//! ```
//!
//! where `p₀` is the current phase reference and `c` the new one (the disk center
//! expressed in the native frame).
//!
//! The correction table is injected: the calibrator never reads global state.
use std::collections::HashMap;

use ahash::RandomState;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::constants::{ArcSec, Radian, DPI};
use crate::flareloc_errors::FlareLocError;
use crate::subcollimator::{GeometryTable, SubcollimatorId};
use crate::visibility::VisibilitySet;

/// Gain and phase correction of one subcollimator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseCalibration {
    pub gain: f64,
    pub phase: Radian,
}

impl PhaseCalibration {
    pub const IDENTITY: PhaseCalibration = PhaseCalibration {
        gain: 1.0,
        phase: 0.0,
    };

    fn factor(&self) -> Complex64 {
        Complex64::from_polar(self.gain, self.phase)
    }
}

impl Default for PhaseCalibration {
    fn default() -> Self {
        PhaseCalibration::IDENTITY
    }
}

/// Lookup `SubcollimatorId → PhaseCalibration`.
#[derive(Debug, Clone, Default)]
pub struct CalibrationTable {
    entries: HashMap<SubcollimatorId, PhaseCalibration, RandomState>,
}

impl CalibrationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Identity correction for every subcollimator of `geometry`.
    pub fn identity(geometry: &GeometryTable) -> Self {
        let mut table = CalibrationTable::new();
        for g in geometry.iter() {
            table.insert(g.id, PhaseCalibration::IDENTITY);
        }
        table
    }

    pub fn insert(&mut self, isc: SubcollimatorId, calibration: PhaseCalibration) {
        self.entries.insert(isc, calibration);
    }

    pub fn get(&self, isc: SubcollimatorId) -> Option<&PhaseCalibration> {
        self.entries.get(&isc)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(SubcollimatorId, PhaseCalibration)> for CalibrationTable {
    fn from_iter<T: IntoIterator<Item = (SubcollimatorId, PhaseCalibration)>>(iter: T) -> Self {
        CalibrationTable {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Calibrate a visibility set and re-phase it on `phase_center`.
///
/// Arguments
/// -----------------
/// * `set`: raw visibilities, phased on their own `phase_center`.
/// * `phase_center`: new phase reference (native frame, arcsec).
/// * `table`: per-subcollimator gain/phase corrections.
///
/// Return
/// ----------
/// * A set with the same number of visibilities, phased on `phase_center`.
///
/// Errors
/// ----------
/// * [`FlareLocError::CalibrationMissing`] for the first subcollimator without entry.
pub fn calibrate(
    set: &VisibilitySet,
    phase_center: (ArcSec, ArcSec),
    table: &CalibrationTable,
) -> Result<VisibilitySet, FlareLocError> {
    let shift = (
        set.phase_center.0 - phase_center.0,
        set.phase_center.1 - phase_center.1,
    );

    let visibilities = set
        .visibilities
        .iter()
        .map(|vis| {
            let cal = table
                .get(vis.isc)
                .ok_or(FlareLocError::CalibrationMissing(vis.isc))?;
            let geometric = Complex64::from_polar(1.0, -DPI * (vis.u * shift.0 + vis.v * shift.1));
            let mut out = *vis;
            out.amplitude = vis.amplitude * geometric * cal.factor();
            Ok(out)
        })
        .collect::<Result<_, FlareLocError>>()?;

    Ok(VisibilitySet {
        visibilities,
        phase_center,
        window: set.window,
        energy: set.energy,
    })
}
