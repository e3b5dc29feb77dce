//! In-memory ephemeris: tabulated observer positions and imager attitudes, linearly
//! interpolated in time.
//!
//! Positions are interpolated in HGS cartesian coordinates and converted back to
//! longitude/latitude/distance, so a table crossing the ±180° longitude seam stays
//! continuous. Attitudes are interpolated component-wise.
use std::collections::HashMap;

use ahash::RandomState;
use hifitime::Epoch;
use itertools::Itertools;
use nalgebra::Vector3;

use crate::constants::RADEG;
use crate::flareloc_errors::FlareLocError;
use crate::observers::{Ephemeris, InstrumentAttitude, ObserverName, ObserverPosition};

#[derive(Debug, Clone, Default)]
pub struct EphemerisTable {
    positions: HashMap<ObserverName, Vec<(Epoch, ObserverPosition)>, RandomState>,
    attitudes: Vec<(Epoch, InstrumentAttitude)>,
    /// Hold the first/last sample outside the tabulated span instead of failing
    hold_ends: bool,
}

/// Bracketing samples of `epoch` and the interpolation fraction between them.
fn bracket<T>(samples: &[(Epoch, T)], epoch: Epoch, hold_ends: bool) -> Option<(&T, &T, f64)> {
    let (first, last) = (samples.first()?, samples.last()?);
    if epoch <= first.0 {
        return (hold_ends || epoch == first.0).then_some((&first.1, &first.1, 0.0));
    }
    if epoch >= last.0 {
        return (hold_ends || epoch == last.0).then_some((&last.1, &last.1, 0.0));
    }
    let idx = samples.partition_point(|(t, _)| *t <= epoch);
    let (t0, a) = &samples[idx - 1];
    let (t1, b) = &samples[idx];
    let span = (*t1 - *t0).to_seconds();
    let frac = if span > 0.0 {
        (epoch - *t0).to_seconds() / span
    } else {
        0.0
    };
    Some((a, b, frac))
}

impl EphemerisTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table answering the same position and attitude for every epoch.
    pub fn constant(positions: Vec<ObserverPosition>, attitude: InstrumentAttitude) -> Self {
        let epoch = Epoch::from_gregorian_utc_at_midnight(2000, 1, 1);
        let mut table = EphemerisTable {
            hold_ends: true,
            ..Default::default()
        };
        for position in positions {
            table.insert_position(epoch, position);
        }
        table.insert_attitude(epoch, attitude);
        table
    }

    pub fn insert_position(&mut self, epoch: Epoch, position: ObserverPosition) {
        let samples = self.positions.entry(position.name.clone()).or_default();
        let idx = samples.partition_point(|(t, _)| *t <= epoch);
        samples.insert(idx, (epoch, position));
    }

    pub fn insert_attitude(&mut self, epoch: Epoch, attitude: InstrumentAttitude) {
        let idx = self.attitudes.partition_point(|(t, _)| *t <= epoch);
        self.attitudes.insert(idx, (epoch, attitude));
    }

    pub fn observers(&self) -> impl Iterator<Item = &ObserverName> {
        self.positions.keys()
    }
}

impl Ephemeris for EphemerisTable {
    fn position(
        &self,
        observer: &ObserverName,
        epoch: Epoch,
    ) -> Result<ObserverPosition, FlareLocError> {
        let samples = self.positions.get(observer).ok_or_else(|| {
            FlareLocError::EphemerisUnavailable(format!(
                "no ephemeris for observer {observer} (known: {})",
                self.observers().sorted().join(", ")
            ))
        })?;
        let (a, b, frac) = bracket(samples, epoch, self.hold_ends).ok_or_else(|| {
            FlareLocError::EphemerisUnavailable(format!("{epoch} outside the ephemeris span of {observer}"))
        })?;

        if frac == 0.0 {
            return Ok(a.clone());
        }
        let xyz: Vector3<f64> = a.hgs_cartesian() * (1.0 - frac) + b.hgs_cartesian() * frac;
        let distance = xyz.norm();
        Ok(ObserverPosition::new(
            observer.clone(),
            xyz.y.atan2(xyz.x) / RADEG,
            (xyz.z / distance).asin() / RADEG,
            distance,
        ))
    }

    fn attitude(&self, epoch: Epoch) -> Result<InstrumentAttitude, FlareLocError> {
        let (a, b, frac) = bracket(&self.attitudes, epoch, self.hold_ends).ok_or_else(|| {
            FlareLocError::EphemerisUnavailable(format!("no imager attitude at {epoch}"))
        })?;
        let lerp = |x: f64, y: f64| x + (y - x) * frac;
        Ok(InstrumentAttitude {
            roll: lerp(a.roll, b.roll),
            pointing: (
                lerp(a.pointing.0, b.pointing.0),
                lerp(a.pointing.1, b.pointing.1),
            ),
        })
    }
}
