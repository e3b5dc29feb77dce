//! # Observers and instrument attitude
//!
//! Everything the coordinate layer needs to know about *who* looks at the Sun:
//!
//! - [`ObserverName`] – a named observer (Earth, the imaging spacecraft, or any other),
//! - [`ObserverPosition`] – heliographic Stonyhurst position of an observer at one epoch,
//! - [`InstrumentAttitude`] – roll angle and pointing of the imager at one epoch,
//! - [`Ephemeris`] – the read-only lookup `(observer, epoch) → position/attitude`
//!   injected into the pipeline,
//! - [`rsun_obs`] / [`distance_off_limb`] – apparent solar radius and limb distance.
//!
//! ## Frames & conventions
//!
//! - Positions are heliographic Stonyhurst (HGS): longitude and latitude in **degrees**,
//!   radial distance from Sun center in **kilometers**.
//! - The instrument roll is in **degrees**; the pointing is the helioprojective
//!   coordinate (arcsec) of the instrument optical axis as seen by the spacecraft.
//!
//! ## See also
//! ------------
//! * [`ephemeris_table::EphemerisTable`] – in-memory interpolating implementation.
//! * [`crate::ref_system`] – frame transforms consuming these positions.
pub mod ephemeris_table;

use std::fmt;
use std::str::FromStr;

use hifitime::Epoch;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::constants::{ArcSec, Degree, Kilometer, ARCSEC_PER_RADIAN, AU, RADEG, R_SUN};
use crate::flareloc_errors::FlareLocError;

/// Name of an observer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ObserverName {
    Earth,
    /// The spacecraft carrying the imager
    SolarOrbiter,
    Named(String),
}

impl fmt::Display for ObserverName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObserverName::Earth => f.write_str("earth"),
            ObserverName::SolarOrbiter => f.write_str("solar orbiter"),
            ObserverName::Named(name) => f.write_str(name),
        }
    }
}

impl FromStr for ObserverName {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "earth" => ObserverName::Earth,
            "solar orbiter" | "solo" => ObserverName::SolarOrbiter,
            _ => ObserverName::Named(s.trim().to_string()),
        })
    }
}

/// Heliographic Stonyhurst position of an observer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObserverPosition {
    pub name: ObserverName,
    pub lon: Degree,
    pub lat: Degree,
    pub distance: Kilometer,
}

impl ObserverPosition {
    pub fn new(name: ObserverName, lon: Degree, lat: Degree, distance: Kilometer) -> Self {
        ObserverPosition {
            name,
            lon,
            lat,
            distance,
        }
    }

    /// Observer in the ecliptic-like reference position `(0°, 0°, 1 AU)`.
    pub fn earth_nominal() -> Self {
        ObserverPosition::new(ObserverName::Earth, 0.0, 0.0, AU)
    }

    /// HGS cartesian position (km).
    pub fn hgs_cartesian(&self) -> Vector3<f64> {
        let (lon, lat) = (self.lon * RADEG, self.lat * RADEG);
        Vector3::new(
            self.distance * lat.cos() * lon.cos(),
            self.distance * lat.cos() * lon.sin(),
            self.distance * lat.sin(),
        )
    }

    pub fn distance_au(&self) -> f64 {
        self.distance / AU
    }

    /// Apparent solar radius seen from this observer, in arcsec.
    pub fn rsun_obs(&self) -> ArcSec {
        rsun_obs(self.distance)
    }
}

impl fmt::Display for ObserverPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (lon={:.3}°, lat={:.3}°, d={:.5} AU)",
            self.name,
            self.lon,
            self.lat,
            self.distance_au()
        )
    }
}

/// Roll and pointing of the imager.
///
/// Fields
/// -----------------
/// * `roll` – roll angle of the spacecraft (degrees).
/// * `pointing` – helioprojective coordinate of the optical axis (arcsec).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct InstrumentAttitude {
    pub roll: Degree,
    pub pointing: (ArcSec, ArcSec),
}

/// Read-only source of observer positions and imager attitude.
///
/// Implementations must be shareable between worker threads: the batch driver
/// queries the same ephemeris from every flare in parallel.
pub trait Ephemeris: Send + Sync {
    /// Position of `observer` at `epoch`.
    ///
    /// Errors
    /// ----------
    /// * [`FlareLocError::EphemerisUnavailable`] if the observer is unknown or the
    ///   epoch lies outside the covered span.
    fn position(&self, observer: &ObserverName, epoch: Epoch)
        -> Result<ObserverPosition, FlareLocError>;

    /// Imager attitude at `epoch`.
    fn attitude(&self, epoch: Epoch) -> Result<InstrumentAttitude, FlareLocError>;
}

/// Apparent solar radius, in arcsec, seen from `distance` km of Sun center.
///
/// Uses the small-cone approximation `R☉ / (d − R☉)` radians.
pub fn rsun_obs(distance: Kilometer) -> ArcSec {
    R_SUN / (distance - R_SUN) * ARCSEC_PER_RADIAN
}

/// Distance of a helioprojective coordinate to the solar limb.
///
/// Arguments
/// -----------------
/// * `hpc`: helioprojective `(Tx, Ty)` in arcsec.
/// * `observer`: observer the coordinate is seen from.
///
/// Return
/// ----------
/// * `(distance_off_limb, distance_in_rsun)`: radial distance minus the apparent
///   radius (arcsec, negative on disk) and radial distance in units of the apparent
///   radius. NaN inputs give NaN outputs.
pub fn distance_off_limb(hpc: (ArcSec, ArcSec), observer: &ObserverPosition) -> (ArcSec, f64) {
    let radius = observer.rsun_obs();
    let rho = hpc.0.hypot(hpc.1);
    (rho - radius, rho / radius)
}

#[cfg(test)]
mod observers_test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_rsun_obs_at_one_au() {
        // ~ 959.6" with the small-cone approximation
        let r = rsun_obs(AU);
        assert!((r - 963.0).abs() < 5.0, "r = {r}");
        assert!(rsun_obs(0.3 * AU) > 3.0 * r);
    }

    #[test]
    fn test_distance_off_limb() {
        let earth = ObserverPosition::earth_nominal();
        let r = earth.rsun_obs();
        let (off, in_rsun) = distance_off_limb((0.0, 2.0 * r), &earth);
        assert_relative_eq!(off, r, epsilon = 1e-9);
        assert_relative_eq!(in_rsun, 2.0, epsilon = 1e-12);

        let (off, _) = distance_off_limb((0.0, 0.0), &earth);
        assert!(off < 0.0);

        let (off, in_rsun) = distance_off_limb((f64::NAN, 0.0), &earth);
        assert!(off.is_nan() && in_rsun.is_nan());
    }

    #[test]
    fn test_hgs_cartesian() {
        let p = ObserverPosition::new(ObserverName::SolarOrbiter, 90.0, 0.0, 0.5 * AU);
        let xyz = p.hgs_cartesian();
        assert_relative_eq!(xyz.x, 0.0, epsilon = 1e-3);
        assert_relative_eq!(xyz.y, 0.5 * AU, epsilon = 1e-3);
        assert_relative_eq!(xyz.z, 0.0, epsilon = 1e-3);
        assert_relative_eq!(p.distance_au(), 0.5);
    }

    #[test]
    fn test_observer_name_parsing() {
        assert_eq!("Earth".parse::<ObserverName>().unwrap(), ObserverName::Earth);
        assert_eq!("solo".parse::<ObserverName>().unwrap(), ObserverName::SolarOrbiter);
        assert_eq!(
            "PSP".parse::<ObserverName>().unwrap(),
            ObserverName::Named("PSP".into())
        );
        assert_eq!(ObserverName::SolarOrbiter.to_string(), "solar orbiter");
    }
}
