//! # Constants and type definitions for flareloc
//!
//! This module centralizes the **physical constants**, **conversion factors**, and **common type
//! definitions** used throughout the `flareloc` library.
//!
//! ## Overview
//!
//! - Solar and heliospheric constants (solar radius, astronomical unit)
//! - Unit conversions (degrees ↔ radians, arcseconds ↔ radians)
//! - Core type aliases used across the crate
//! - Identifiers for flares and the inline container used for visibilities
//!
//! These definitions are used by every stage of the pipeline, from meta-pixel extraction
//! to the coordinate transform layer.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::visibility::Visibility;

// -------------------------------------------------------------------------------------------------
// Physical constants and unit conversions
// -------------------------------------------------------------------------------------------------

/// 2π, useful for trigonometric conversions
pub const DPI: f64 = 2. * std::f64::consts::PI;

/// Astronomical Unit in kilometers (IAU 2012)
pub const AU: f64 = 149_597_870.7;

/// Nominal solar radius in kilometers (IAU 2015 B3)
pub const R_SUN: f64 = 695_700.0;

/// Degrees → radians
pub const RADEG: f64 = std::f64::consts::PI / 180.0;

/// Arcseconds → radians
pub const RADSEC: f64 = std::f64::consts::PI / 648000.0;

/// Radians → arcseconds
pub const ARCSEC_PER_RADIAN: f64 = 648000.0 / std::f64::consts::PI;

/// Number of seconds in a Julian day
pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Julian Date of the start of Carrington rotation 1 (1853 Nov 9)
pub const CARRINGTON_EPOCH_JD: f64 = 2_398_140.227;

/// Mean synodic Carrington rotation period, in days
pub const CARRINGTON_SYNODIC_PERIOD: f64 = 27.275_231_6;

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// Angle in degrees
pub type Degree = f64;
/// Angle in arcseconds
pub type ArcSec = f64;
/// Angle in radians
pub type Radian = f64;
/// Distance in kilometers
pub type Kilometer = f64;
/// Duration in seconds
pub type Second = f64;
/// Photon energy in keV
pub type KeV = f64;

// -------------------------------------------------------------------------------------------------
// Identifiers and data containers
// -------------------------------------------------------------------------------------------------

/// Identifier of a flare in an event catalog.
///
/// This can be:
/// - A numeric catalog id (e.g. `Int(2104190012)`)
/// - A free-form label (e.g. `"2022-03-30T17:30"`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FlareId {
    /// Integer catalog identifier
    Int(u64),
    /// String-based identifier
    String(String),
}

impl std::fmt::Display for FlareId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlareId::Int(n) => write!(f, "{n}"),
            FlareId::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<u64> for FlareId {
    fn from(n: u64) -> Self {
        FlareId::Int(n)
    }
}

impl From<String> for FlareId {
    fn from(s: String) -> Self {
        FlareId::String(s)
    }
}

impl From<&str> for FlareId {
    fn from(s: &str) -> Self {
        FlareId::String(s.to_string())
    }
}

impl std::str::FromStr for FlareId {
    type Err = std::convert::Infallible;

    /// Parse a `FlareId` from a string.
    /// - Pure digits → `Int(u64)`
    /// - Otherwise  → `String(String)`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.parse::<u64>() {
            Ok(n) => FlareId::Int(n),
            Err(_) => FlareId::String(s.to_string()),
        })
    }
}

/// Inline-optimized container for the visibilities of a single estimate.
///
/// An imager carries a few tens of subcollimators, so a full set fits on the stack.
pub type Visibilities = SmallVec<[Visibility; 32]>;
