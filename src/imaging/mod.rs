//! # Back-projection imaging
//!
//! Direct synthesis of a dirty map from a sparse visibility set: every pixel receives
//! the weighted real part of each visibility rotated to the pixel's sky offset,
//!
//! ```text
//! I(x, y) = Σ_k w_k · Re(V_k · exp(2πi (u_k x + v_k y)))
//! ```
//!
//! where `(x, y)` is the offset (arcsec) of the pixel center from the phase center of
//! the set. There is no deconvolution; the map is linear in the visibilities.
//!
//! ## Field of view
//!
//! The pixel size is a fixed multiple of the apparent solar radius divided by the
//! number of pixels ([`ImagingGeometry::full_disk`]), so the whole disk and some
//! margin always fit in the map.
//!
//! ## See also
//! ------------
//! * [`map::Map`] – output container and world coordinates.
//! * [`peak::locate_peak`] – brightest-pixel localization.
//! * [`fits`] – persistence of maps for later audit.
pub mod fits;
pub mod map;
pub mod peak;

use std::fmt;

use ndarray::{Array2, Zip};

use crate::constants::{ArcSec, Kilometer};
use crate::flareloc_errors::FlareLocError;
use crate::imaging::map::{Map, MapFrame, MapWcs};
use crate::observers::rsun_obs;
use crate::visibility::VisibilitySet;

/// Square pixel grid of a back-projection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImagingGeometry {
    pub npix: usize,
    /// Angular pixel size, arcsec
    pub pixel_size: ArcSec,
}

impl ImagingGeometry {
    /// Arguments
    /// -----------------
    /// * `npix`: number of pixels per side, non-zero.
    /// * `pixel_size`: pixel size in arcsec, finite and positive.
    pub fn new(npix: usize, pixel_size: ArcSec) -> Result<Self, FlareLocError> {
        if npix == 0 {
            return Err(FlareLocError::InvalidParameter(
                "image size must be at least one pixel".into(),
            ));
        }
        if !(pixel_size.is_finite() && pixel_size > 0.0) {
            return Err(FlareLocError::InvalidParameter(format!(
                "pixel size must be finite and > 0, got {pixel_size}"
            )));
        }
        Ok(ImagingGeometry { npix, pixel_size })
    }

    /// Grid covering the whole solar disk seen from `observer_distance` km.
    ///
    /// `pixel_size = fov_factor · R_obs / npix`, with `R_obs` the apparent solar radius.
    pub fn full_disk(
        npix: usize,
        fov_factor: f64,
        observer_distance: Kilometer,
    ) -> Result<Self, FlareLocError> {
        ImagingGeometry::new(npix, fov_factor * rsun_obs(observer_distance) / npix as f64)
    }

    /// Field of view along one side, arcsec.
    pub fn field_of_view(&self) -> ArcSec {
        self.pixel_size * self.npix as f64
    }

    /// Offset (arcsec) of the center of pixel `[row, col]` from the map center.
    pub fn offset(&self, row: usize, col: usize) -> (ArcSec, ArcSec) {
        let mid = (self.npix as f64 - 1.0) / 2.0;
        (
            (col as f64 - mid) * self.pixel_size,
            (row as f64 - mid) * self.pixel_size,
        )
    }
}

impl fmt::Display for ImagingGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{n}×{n} px of {:.3}\" (fov {:.1}\")",
            self.pixel_size,
            self.field_of_view(),
            n = self.npix
        )
    }
}

/// Back-project a visibility set onto a native-frame map.
///
/// Arguments
/// -----------------
/// * `set`: calibrated (and usually band-selected) visibilities.
/// * `geometry`: pixel grid; the map is centered on `set.phase_center`.
///
/// Return
/// ----------
/// * The dirty [`Map`] in the [`MapFrame::Native`] frame, reference pixel at the grid
///   center with world coordinate `set.phase_center`. An empty set yields an all-zero map.
///
/// Remarks
/// ----------
/// * Pixels are computed in parallel; each pixel sums the visibilities in set order,
///   so the output does not depend on the thread count.
pub fn back_project(set: &VisibilitySet, geometry: &ImagingGeometry) -> Map {
    let mut data = Array2::<f64>::zeros((geometry.npix, geometry.npix));

    Zip::indexed(&mut data).par_for_each(|(row, col), pixel| {
        let offset = geometry.offset(row, col);
        *pixel = set
            .iter()
            .map(|vis| vis.weight * (vis.amplitude * vis.fringe(offset)).re)
            .sum();
    });

    log::debug!(
        "back-projected {} visibilities onto {geometry}",
        set.len()
    );

    Map::new(
        data,
        MapWcs::centered(geometry.npix, set.phase_center, geometry.pixel_size, 0.0),
        MapFrame::Native,
    )
}
