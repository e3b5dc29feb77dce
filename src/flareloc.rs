//! # FlareLoc: the per-flare localization pipeline
//!
//! This module defines [`FlareLoc`], the façade that wires together the read-only
//! inputs shared by every flare and runs the imaging pipeline on one
//! [`FlareRequest`]:
//!
//! 1. **Window & energy**: `peak ± half_window`; the energy range is widened when the
//!    attenuator was inserted inside the window.
//! 2. **Meta-pixels**: per-subfield aggregation of the raw counts
//!    ([`extract_meta_pixels`]).
//! 3. **Visibilities**: synthesis phased on the prior location
//!    ([`synthesize_visibilities`]), calibration onto the disk center
//!    ([`calibrate`]), restriction to the resolution band ([`select_band`]).
//! 4. **Imaging**: full-disk back-projection ([`back_project`]).
//! 5. **Localization & quality**: brightest pixel ([`locate_peak`]), native and
//!    helioprojective coordinates, sidelobe ratio ([`sidelobe_ratio`]).
//! 6. **Persistence** (optional): the native map is written to
//!    `params.map_dir/<flare id>.fits`.
//!
//! All shared inputs are immutable: a single [`FlareLoc`] can serve every worker of
//! a parallel batch.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use flareloc::estimation_params::EstimationParams;
//! use flareloc::flareloc::FlareLoc;
//! use flareloc::observers::ephemeris_table::EphemerisTable;
//! use flareloc::subcollimator::GeometryTable;
//! use flareloc::visibility::calibration::CalibrationTable;
//!
//! let geometry = GeometryTable::default_imaging();
//! let calibration = CalibrationTable::identity(&geometry);
//! let ephemeris = Arc::new(EphemerisTable::new());
//! let flareloc = FlareLoc::new(EstimationParams::default(), geometry, calibration, ephemeris);
//! ```
//!
//! ## See also
//! ------------
//! * [`crate::batch`] – parallel driver over many flares.
//! * [`crate::positions`] – multi-observer enrichment of an estimate.
use std::fmt;
use std::sync::Arc;

use camino::Utf8PathBuf;
use hifitime::Epoch;
use nalgebra::Vector2;

use crate::constants::{Degree, FlareId};
use crate::detector::meta_pixel::extract_meta_pixels;
use crate::estimation_params::EstimationParams;
use crate::flare_estimate::{FlareLocationEstimate, FlareRequest};
use crate::flareloc_errors::FlareLocError;
use crate::imaging::fits::write_map;
use crate::imaging::map::{Map, MapFrame, MapWcs};
use crate::imaging::peak::{locate_peak, PeakLocation};
use crate::imaging::{back_project, ImagingGeometry};
use crate::observers::{Ephemeris, InstrumentAttitude, ObserverName};
use crate::positions::{flare_positions, FlarePositions};
use crate::quality::sidelobe_ratio;
use crate::ref_system::disk_center_native;
use crate::subcollimator::GeometryTable;
use crate::time::TimeWindow;
use crate::visibility::calibration::{calibrate, CalibrationTable};
use crate::visibility::selection::select_band;
use crate::visibility::synthesize_visibilities;

/// Shared, read-only context of the localization pipeline.
#[derive(Clone)]
pub struct FlareLoc {
    params: EstimationParams,
    geometry: GeometryTable,
    calibration: CalibrationTable,
    ephemeris: Arc<dyn Ephemeris>,
}

/// Full output of the pipeline for one flare: the estimate and the map it came from.
#[derive(Debug, Clone)]
pub struct FlareImage {
    pub estimate: FlareLocationEstimate,
    pub peak: PeakLocation,
    /// Back-projected map in the imager native frame
    pub map: Map,
    pub attitude: InstrumentAttitude,
    pub roll_offset: Degree,
    pub imager: ObserverName,
}

impl FlareImage {
    /// The same image with helioprojective world coordinates.
    ///
    /// The native map is centered on the disk center, so the helioprojective map has
    /// the same reference pixel with reference coordinate `(0, 0)` and its axes rotated
    /// by `roll + roll_offset`.
    pub fn hpc_map(&self) -> Map {
        let wcs = MapWcs {
            crval: Vector2::zeros(),
            rotation: self.attitude.roll + self.roll_offset,
            ..self.map.wcs
        };
        self.map
            .reframed(wcs, MapFrame::Helioprojective(self.imager.clone()))
    }
}

impl FlareLoc {
    /// Construct a new [`FlareLoc`] context.
    ///
    /// Arguments
    /// -----------------
    /// * `params`: validated pipeline parameters.
    /// * `geometry`: subcollimator grid geometry.
    /// * `calibration`: per-subcollimator gain/phase corrections.
    /// * `ephemeris`: source of observer positions and imager attitude.
    pub fn new(
        params: EstimationParams,
        geometry: GeometryTable,
        calibration: CalibrationTable,
        ephemeris: Arc<dyn Ephemeris>,
    ) -> Self {
        FlareLoc {
            params,
            geometry,
            calibration,
            ephemeris,
        }
    }

    pub fn params(&self) -> &EstimationParams {
        &self.params
    }

    pub fn geometry(&self) -> &GeometryTable {
        &self.geometry
    }

    pub fn calibration(&self) -> &CalibrationTable {
        &self.calibration
    }

    pub fn ephemeris(&self) -> &dyn Ephemeris {
        self.ephemeris.as_ref()
    }

    /// Run the imaging pipeline on one flare and keep the map.
    ///
    /// Arguments
    /// -----------------
    /// * `request`: flare identifier, peak time and raw counts.
    ///
    /// Return
    /// ----------
    /// * A [`FlareImage`] holding the estimate, the peak and the native map.
    ///
    /// Errors
    /// ----------
    /// * [`FlareLocError::DataGap`] if no sample lies in the window and energy range.
    /// * [`FlareLocError::EphemerisUnavailable`] if the imager position or attitude is
    ///   missing at the peak time.
    /// * [`FlareLocError::GridOpaque`] / [`FlareLocError::CalibrationMissing`] from the
    ///   visibility stages.
    /// * [`FlareLocError::DegenerateImage`] if the band selection is empty or the map
    ///   has no positive maximum.
    pub fn image(&self, request: &FlareRequest) -> Result<FlareImage, FlareLocError> {
        let params = &self.params;
        let id = &request.id;

        let window = TimeWindow::around(request.peak_time, params.half_window);
        let attenuator = request.data.attenuator_inserted(&window);
        let energy = params.energy_range(attenuator);
        log::debug!("flare {id}: window {window}, energy {energy}, attenuator {attenuator}");

        let meta = extract_meta_pixels(&request.data, &window, &energy)?;
        log::debug!("flare {id}: {} meta-pixels", meta.len());

        let attitude = self.ephemeris.attitude(request.peak_time)?;
        let observer = self.ephemeris.position(&params.imager, request.peak_time)?;

        let raw = synthesize_visibilities(
            &meta,
            &self.geometry,
            params.prior_location,
            params.no_shadowing,
        )?;
        let center = disk_center_native(&attitude, params.roll_offset);
        let calibrated = calibrate(&raw, center, &self.calibration)?;
        let selected = select_band(&calibrated, &params.band);
        if selected.is_empty() {
            return Err(FlareLocError::DegenerateImage(format!(
                "no visibility in band {} ({} calibrated)",
                params.band.name,
                calibrated.len()
            )));
        }
        log::debug!(
            "flare {id}: {} visibilities, {} in band {}",
            raw.len(),
            selected.len(),
            params.band.name
        );

        let geometry =
            ImagingGeometry::full_disk(params.image_size, params.fov_factor, observer.distance)?;
        let map = back_project(&selected, &geometry)
            .with_observer(observer)
            .with_date_obs(request.peak_time);

        let peak = locate_peak(&map, &attitude, params.roll_offset)?;
        let ratio = sidelobe_ratio(&map, params.sidelobe_radius)?;
        log::debug!(
            "flare {id}: peak at [{}, {}] native=({:.1}, {:.1}) sidelobe ratio {ratio:.3}",
            peak.row,
            peak.col,
            peak.native.0,
            peak.native.1
        );

        let estimate = FlareLocationEstimate {
            id: id.clone(),
            native: peak.native,
            hpc: peak.hpc,
            peak_value: peak.value,
            sidelobe_ratio: ratio,
            attenuator,
            energy: Some(energy),
            n_visibilities: selected.len(),
            window: Some(meta.effective),
            error: None,
        };

        Ok(FlareImage {
            estimate,
            peak,
            map,
            attitude,
            roll_offset: params.roll_offset,
            imager: params.imager.clone(),
        })
    }

    /// Localize one flare.
    ///
    /// Runs [`FlareLoc::image`], writes the native map to `params.map_dir` when set,
    /// and keeps only the estimate.
    ///
    /// Errors
    /// ----------
    /// * Every error of [`FlareLoc::image`].
    /// * [`FlareLocError::FitsIo`] if the map cannot be written.
    pub fn estimate(&self, request: &FlareRequest) -> Result<FlareLocationEstimate, FlareLocError> {
        let image = self.image(request)?;
        if let Some(dir) = &self.params.map_dir {
            let path = dir.join(map_file_name(&request.id));
            write_map(&image.map, &path)?;
            log::debug!("flare {}: map written to {path}", request.id);
        }
        Ok(image.estimate)
    }

    /// Positions of a successful estimate as seen from Earth and in heliographic frames.
    ///
    /// Arguments
    /// -----------------
    /// * `estimate`: estimate produced by this context.
    /// * `epoch`: observation time (the flare peak time).
    ///
    /// Errors
    /// ----------
    /// * [`FlareLocError::EphemerisUnavailable`] if the imager or Earth position is
    ///   missing at `epoch`.
    pub fn positions(
        &self,
        estimate: &FlareLocationEstimate,
        epoch: Epoch,
    ) -> Result<FlarePositions, FlareLocError> {
        let imager = self.ephemeris.position(&self.params.imager, epoch)?;
        let earth = self.ephemeris.position(&ObserverName::Earth, epoch)?;
        Ok(flare_positions(estimate.hpc, &imager, &earth, epoch))
    }

    /// Path of the map persisted for flare `id`, if maps are persisted.
    pub fn map_path(&self, id: &FlareId) -> Option<Utf8PathBuf> {
        self.params
            .map_dir
            .as_ref()
            .map(|dir| dir.join(map_file_name(id)))
    }
}

impl fmt::Debug for FlareLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlareLoc")
            .field("params", &self.params)
            .field("geometry", &self.geometry.len())
            .field("calibration", &self.calibration.len())
            .finish_non_exhaustive()
    }
}

/// File name of the map of flare `id`; characters unsafe in a path become `_`.
fn map_file_name(id: &FlareId) -> String {
    let stem: String = id
        .to_string()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{stem}.fits")
}

#[cfg(test)]
mod flareloc_test {
    use super::*;

    #[test]
    fn test_map_file_name() {
        assert_eq!(map_file_name(&FlareId::Int(2104190012)), "2104190012.fits");
        assert_eq!(
            map_file_name(&FlareId::from("2022-03-30T17:30 a/b")),
            "2022-03-30T17_30_a_b.fits"
        );
    }
}
