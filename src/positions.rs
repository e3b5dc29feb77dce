//! # Multi-observer positions of a flare
//!
//! Given the helioprojective location of a flare seen by the imaging spacecraft,
//! rebuild its 3-D heliographic position and express it for other consumers:
//!
//! - helioprojective coordinates seen from Earth (NaN when the flare is hidden),
//! - heliographic Stonyhurst and Carrington longitude/latitude,
//! - distance to the limb seen from the imager,
//! - position of the imaging spacecraft itself.
//!
//! Directions that miss the solar disk are placed on a spherical screen centered on
//! the observer and passing through Sun center, the same convention as
//! [`reproject_hpc`](crate::ref_system::reproject_hpc).
use std::fmt;

use hifitime::Epoch;
use serde::{Deserialize, Serialize};

use crate::constants::{ArcSec, Degree};
use crate::observers::{distance_off_limb, ObserverPosition};
use crate::ref_system::{
    cartesian_to_hgs, hgs_point_to_hpc, hgs_to_hgc_lon, hpc_to_hgs_point, is_visible,
    OffDiskPolicy,
};

/// Positions of one flare in the frames used downstream.
///
/// Fields
/// -----------------
/// * `hpc_earth` – helioprojective `(Tx, Ty)` seen from Earth, NaN if not visible.
/// * `visible_from_earth` – whether Earth can see the flare.
/// * `hgs` – heliographic Stonyhurst `(lon, lat)`, degrees.
/// * `hgc` – heliographic Carrington `(lon, lat)`, degrees, lon in `[0°, 360°)`.
/// * `distance_off_limb` – radial distance to the limb seen from the imager, arcsec.
/// * `distance_rsun` – radial distance seen from the imager, apparent solar radii.
/// * `imager_lon`, `imager_lat` – HGS position of the imaging spacecraft, degrees.
/// * `imager_distance_au` – distance of the imaging spacecraft to Sun center, AU.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlarePositions {
    pub hpc_earth: (ArcSec, ArcSec),
    pub visible_from_earth: bool,
    pub hgs: (Degree, Degree),
    pub hgc: (Degree, Degree),
    pub distance_off_limb: ArcSec,
    pub distance_rsun: f64,
    pub imager_lon: Degree,
    pub imager_lat: Degree,
    pub imager_distance_au: f64,
}

/// Positions of a flare located at `hpc` by `imager`.
///
/// Arguments
/// -----------------
/// * `hpc`: helioprojective `(Tx, Ty)` of the flare seen from `imager`, arcsec.
/// * `imager`: HGS position of the imaging spacecraft at `epoch`.
/// * `earth`: HGS position of Earth at `epoch`.
/// * `epoch`: observation time, for the Carrington longitude.
///
/// Return
/// ----------
/// * A [`FlarePositions`]; NaN inputs give NaN coordinates and
///   `visible_from_earth == false`.
pub fn flare_positions(
    hpc: (ArcSec, ArcSec),
    imager: &ObserverPosition,
    earth: &ObserverPosition,
    epoch: Epoch,
) -> FlarePositions {
    let point = hpc_to_hgs_point(hpc, imager, OffDiskPolicy::SphericalScreen);
    let (lon, lat, _) = cartesian_to_hgs(&point);
    let (off_limb, in_rsun) = distance_off_limb(hpc, imager);

    FlarePositions {
        hpc_earth: hgs_point_to_hpc(&point, earth),
        visible_from_earth: is_visible(&point, earth),
        hgs: (lon, lat),
        hgc: (hgs_to_hgc_lon(lon, epoch), lat),
        distance_off_limb: off_limb,
        distance_rsun: in_rsun,
        imager_lon: imager.lon,
        imager_lat: imager.lat,
        imager_distance_au: imager.distance_au(),
    }
}

impl fmt::Display for FlarePositions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "HGS=({:.2}°, {:.2}°) HGC=({:.2}°, {:.2}°) earth=",
            self.hgs.0, self.hgs.1, self.hgc.0, self.hgc.1
        )?;
        if self.visible_from_earth {
            write!(f, "({:.1}\", {:.1}\")", self.hpc_earth.0, self.hpc_earth.1)
        } else {
            f.write_str("hidden")
        }
    }
}
