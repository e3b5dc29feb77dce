//! # Raw detector counts
//!
//! Time-tagged, energy-tagged count samples as delivered by the instrument data
//! product. Each [`CountSample`] covers one accumulation interval of one
//! [`Subfield`] (subcollimator × phase quadrant) in one energy channel and carries a
//! background estimate alongside the raw counts.
//!
//! The module also answers the question the batch driver asks before imaging: was
//! the attenuator inserted during the window? The rate-control regime (RCR) of the
//! instrument is non-zero whenever it is, and the energy window is then widened.
//!
//! ## See also
//! ------------
//! * [`meta_pixel::extract_meta_pixels`] – aggregation over a time/energy window.
//! * [`crate::estimation_params::EstimationParams`] – nominal/attenuated energy ranges.
pub mod meta_pixel;

use std::fmt;

use hifitime::{Duration, Epoch};
use serde::{Deserialize, Serialize};

use crate::constants::{KeV, Second};
use crate::subcollimator::SubcollimatorId;
use crate::time::TimeWindow;

/// Closed energy interval `[low, high]` in keV.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnergyRange {
    pub low: KeV,
    pub high: KeV,
}

impl EnergyRange {
    pub fn new(low: KeV, high: KeV) -> Self {
        EnergyRange { low, high }
    }

    /// True if the channel `other` lies entirely inside this range
    pub fn contains_channel(&self, other: &EnergyRange) -> bool {
        other.low >= self.low && other.high <= self.high
    }
}

impl fmt::Display for EnergyRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{} keV", self.low, self.high)
    }
}

/// Moiré phase sampled by a pixel column, in steps of 90°.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PhaseQuadrant {
    A,
    B,
    C,
    D,
}

impl PhaseQuadrant {
    pub const ALL: [PhaseQuadrant; 4] = [
        PhaseQuadrant::A,
        PhaseQuadrant::B,
        PhaseQuadrant::C,
        PhaseQuadrant::D,
    ];

    /// Position of the quadrant in `A, B, C, D` order; its phase offset is `index · 90°`.
    pub fn index(&self) -> usize {
        match self {
            PhaseQuadrant::A => 0,
            PhaseQuadrant::B => 1,
            PhaseQuadrant::C => 2,
            PhaseQuadrant::D => 3,
        }
    }
}

/// One detector subfield: a subcollimator and one of its phase quadrants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Subfield {
    pub isc: SubcollimatorId,
    pub quadrant: PhaseQuadrant,
}

impl fmt::Display for Subfield {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:?}", self.isc, self.quadrant)
    }
}

/// Counts of one subfield over one accumulation interval and energy channel.
///
/// Fields
/// -----------------
/// * `start` – beginning of the accumulation interval.
/// * `duration` – accumulation length (seconds).
/// * `live_fraction` – fraction of `duration` the detector was live, in `[0, 1]`.
/// * `channel` – energy channel bounds.
/// * `subfield` – subcollimator and phase quadrant.
/// * `counts` – raw counts.
/// * `background` – background estimate for the same interval (counts).
/// * `rcr` – rate-control regime; non-zero means the attenuator is inserted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CountSample {
    pub start: Epoch,
    pub duration: Second,
    pub live_fraction: f64,
    pub channel: EnergyRange,
    pub subfield: Subfield,
    pub counts: f64,
    pub background: f64,
    pub rcr: u8,
}

impl CountSample {
    pub fn end(&self) -> Epoch {
        self.start + Duration::from_seconds(self.duration)
    }
}

/// The raw count series of one data product (typically one file per flare).
#[derive(Debug, Clone, Default)]
pub struct RawCountData {
    pub samples: Vec<CountSample>,
}

impl RawCountData {
    pub fn new(samples: Vec<CountSample>) -> Self {
        RawCountData { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Whether the attenuator was inserted at any time inside `window`.
    ///
    /// The attenuator state is read from the rate-control regime of every sample
    /// starting inside the window: a single non-zero RCR is enough.
    pub fn attenuator_inserted(&self, window: &TimeWindow) -> bool {
        self.samples
            .iter()
            .any(|s| window.contains(s.start) && s.rcr != 0)
    }
}
