//! # Subcollimator geometry and resolution bands
//!
//! Each imaging subcollimator is a pair of grids whose moiré pattern samples **one**
//! spatial frequency of the sky brightness. This module holds:
//!
//! * [`SubcollimatorId`] – detector/subcollimator index (1..=32),
//! * [`SubcollimatorLabel`] – resolution number (1 = finest … 10 = coarsest) plus
//!   orientation letter (`a`, `b`, `c`), e.g. `10a`,
//! * [`SubcollimatorGeometry`] – angular period, grid orientation, slit fraction and
//!   grid thickness-to-pitch ratio, from which `(u, v)` and the grid transmission follow,
//! * [`GeometryTable`] – lookup `SubcollimatorId → SubcollimatorGeometry`,
//! * [`ResolutionBand`] – explicit set of subcollimators used for imaging.
//!
//! ## Units
//!
//! * periods in **arcsec**, spatial frequencies in **cycles / arcsec**,
//! * orientations in **degrees**, counter-clockwise from the native +x axis.
//!
//! Tables are plain values: the calibrator and the selector receive them as arguments,
//! so tests can inject synthetic layouts.
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::ops::RangeInclusive;

use ahash::RandomState;
use serde::{Deserialize, Serialize};

use crate::constants::{ArcSec, Degree, RADEG, RADSEC};

/// Angular period of the finest subcollimators (resolution number 1), in arcsec
pub const FINEST_PERIOD: ArcSec = 14.6;

/// Ratio between the periods of two consecutive resolution numbers
pub const PERIOD_RATIO: f64 = 1.43;

/// Front-to-rear grid separation, in millimetres
pub const GRID_SEPARATION_MM: f64 = 550.0;

/// Grid thickness, in millimetres
pub const GRID_THICKNESS_MM: f64 = 0.4;

/// Subcollimator index as assigned on the detector plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubcollimatorId(pub u8);

impl fmt::Display for SubcollimatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Resolution number and orientation letter of a subcollimator (e.g. `7c`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubcollimatorLabel {
    pub resolution: u8,
    pub letter: char,
}

impl fmt::Display for SubcollimatorLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.resolution, self.letter)
    }
}

/// Static geometry of one subcollimator.
///
/// Fields
/// -----------------
/// * `id` – subcollimator index.
/// * `label` – resolution number and orientation letter.
/// * `period` – angular period of the moiré response (arcsec).
/// * `orientation` – direction of the grid normal (degrees).
/// * `slit_fraction` – slit width over pitch; on-axis transmission of the grid pair.
/// * `thickness_ratio` – grid thickness over pitch, drives off-axis shadowing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubcollimatorGeometry {
    pub id: SubcollimatorId,
    pub label: SubcollimatorLabel,
    pub period: ArcSec,
    pub orientation: Degree,
    pub slit_fraction: f64,
    pub thickness_ratio: f64,
}

impl SubcollimatorGeometry {
    /// Spatial frequency sampled by this subcollimator.
    ///
    /// Return
    /// ----------
    /// * `(u, v)` in cycles per arcsec: `(cos θ, sin θ) / period`.
    pub fn uv(&self) -> (f64, f64) {
        let theta = self.orientation * RADEG;
        (theta.cos() / self.period, theta.sin() / self.period)
    }

    /// Grid-pair transmission for a source at `location` (native frame, arcsec).
    ///
    /// Only the off-axis angle along the grid normal shadows the slits:
    ///
    /// ```text
    /// T = slit_fraction − thickness_ratio · |tan(θ⊥)|
    /// ```
    ///
    /// The value may be negative for extreme off-axis angles; callers decide how to
    /// treat an opaque grid.
    pub fn transmission(&self, location: (ArcSec, ArcSec)) -> f64 {
        let theta = self.orientation * RADEG;
        let off_axis = (location.0 * theta.cos() + location.1 * theta.sin()) * RADSEC;
        self.slit_fraction - self.thickness_ratio * off_axis.tan().abs()
    }
}

/// Subcollimator indices ordered by resolution number (10 → 1) then letter (a, b, c).
const DEFAULT_LAYOUT: [(u8, [u8; 3]); 10] = [
    (10, [3, 20, 22]),
    (9, [16, 14, 32]),
    (8, [21, 26, 4]),
    (7, [24, 8, 28]),
    (6, [15, 27, 31]),
    (5, [6, 30, 2]),
    (4, [25, 5, 23]),
    (3, [7, 29, 1]),
    (2, [12, 19, 17]),
    (1, [11, 13, 18]),
];

/// Lookup table `SubcollimatorId → SubcollimatorGeometry`.
#[derive(Debug, Clone, Default)]
pub struct GeometryTable {
    entries: HashMap<SubcollimatorId, SubcollimatorGeometry, RandomState>,
}

impl GeometryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The 30-subcollimator imaging layout.
    ///
    /// Periods grow geometrically from [`FINEST_PERIOD`] by [`PERIOD_RATIO`] per
    /// resolution number; the three letters of a resolution number are 60° apart and
    /// each resolution number is rotated by a further 20° to spread the `(u, v)`
    /// coverage.
    pub fn default_imaging() -> Self {
        let mut table = GeometryTable::new();
        for (resolution, ids) in DEFAULT_LAYOUT {
            let period = FINEST_PERIOD * PERIOD_RATIO.powi(resolution as i32 - 1);
            let pitch_mm = period * RADSEC * GRID_SEPARATION_MM;
            for (k, (id, letter)) in ids.iter().zip(['a', 'b', 'c']).enumerate() {
                let orientation =
                    (150.0 - 60.0 * k as f64 + 20.0 * (resolution as f64 - 1.0)).rem_euclid(180.0);
                table.insert(SubcollimatorGeometry {
                    id: SubcollimatorId(*id),
                    label: SubcollimatorLabel { resolution, letter },
                    period,
                    orientation,
                    slit_fraction: 0.5,
                    thickness_ratio: GRID_THICKNESS_MM / pitch_mm,
                });
            }
        }
        table
    }

    pub fn insert(&mut self, geometry: SubcollimatorGeometry) {
        self.entries.insert(geometry.id, geometry);
    }

    pub fn get(&self, id: SubcollimatorId) -> Option<&SubcollimatorGeometry> {
        self.entries.get(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SubcollimatorGeometry> {
        self.entries.values()
    }
}

/// Explicit set of subcollimators admitted to imaging.
///
/// The band fixes the effective resolution of the back-projection: changing it is a
/// configuration decision, never implicit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionBand {
    pub name: String,
    members: BTreeSet<SubcollimatorId>,
}

impl ResolutionBand {
    pub fn new(name: impl Into<String>, members: impl IntoIterator<Item = SubcollimatorId>) -> Self {
        ResolutionBand {
            name: name.into(),
            members: members.into_iter().collect(),
        }
    }

    /// Band gathering every subcollimator whose resolution number lies in `resolutions`.
    pub fn from_resolutions(table: &GeometryTable, resolutions: RangeInclusive<u8>) -> Self {
        let name = format!("{}-{}", resolutions.start(), resolutions.end());
        let members = table
            .iter()
            .filter(|g| resolutions.contains(&g.label.resolution))
            .map(|g| g.id);
        ResolutionBand::new(name, members)
    }

    /// The coarse band (resolution numbers 7 to 10) used for full-disk localization.
    pub fn coarse() -> Self {
        ResolutionBand::new(
            "7-10",
            [3, 20, 22, 16, 14, 32, 21, 26, 4, 24, 8, 28].map(SubcollimatorId),
        )
    }

    pub fn contains(&self, id: SubcollimatorId) -> bool {
        self.members.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn members(&self) -> impl Iterator<Item = SubcollimatorId> + '_ {
        self.members.iter().copied()
    }
}

impl Default for ResolutionBand {
    fn default() -> Self {
        ResolutionBand::coarse()
    }
}

#[cfg(test)]
mod subcollimator_test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_layout_is_complete() {
        let table = GeometryTable::default_imaging();
        assert_eq!(table.len(), 30);
        assert!(table.get(SubcollimatorId(9)).is_none());
        assert!(table.get(SubcollimatorId(10)).is_none());

        let g = table.get(SubcollimatorId(3)).unwrap();
        assert_eq!(g.label.to_string(), "10a");
        assert_relative_eq!(g.period, FINEST_PERIOD * PERIOD_RATIO.powi(9), epsilon = 1e-9);
    }

    #[test]
    fn test_coarse_band_matches_labels() {
        let table = GeometryTable::default_imaging();
        let from_labels = ResolutionBand::from_resolutions(&table, 7..=10);
        let coarse = ResolutionBand::coarse();
        assert_eq!(from_labels.len(), 12);
        assert!(coarse.members().eq(from_labels.members()));
    }

    #[test]
    fn test_uv_magnitude_is_inverse_period() {
        let table = GeometryTable::default_imaging();
        for g in table.iter() {
            let (u, v) = g.uv();
            assert_relative_eq!((u * u + v * v).sqrt(), 1.0 / g.period, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_transmission_on_and_off_axis() {
        let g = *GeometryTable::default_imaging().get(SubcollimatorId(11)).unwrap();
        assert_relative_eq!(g.transmission((0.0, 0.0)), 0.5);

        // Shadowing only acts along the grid normal.
        let theta = g.orientation * RADEG;
        let along = (1000.0 * theta.cos(), 1000.0 * theta.sin());
        let across = (-1000.0 * theta.sin(), 1000.0 * theta.cos());
        assert!(g.transmission(along) < 0.5);
        assert_relative_eq!(g.transmission(across), 0.5, epsilon = 1e-12);
    }
}
