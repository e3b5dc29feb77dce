//! # Flare estimation parameters
//!
//! This module defines the [`EstimationParams`] configuration struct and its builder,
//! which control every tunable of the per-flare pipeline run by
//! [`FlareLoc`](crate::flareloc::FlareLoc).
//!
//! ## Pipeline overview
//!
//! 1. **Window selection**
//!    Counts are aggregated over `peak ± half_window`. The energy range is
//!    `nominal_energy`, or `attenuated_energy` when the attenuator was inserted during
//!    the window.
//!
//! 2. **Visibilities**
//!    Visibilities are phased on `prior_location` (native frame), with or without the
//!    grid shadowing correction (`no_shadowing`), then calibrated onto the disk center
//!    and restricted to `band`.
//!
//! 3. **Imaging**
//!    A square `image_size × image_size` back-projection whose field of view is
//!    `fov_factor` apparent solar radii.
//!
//! 4. **Localization & quality**
//!    The native peak is rotated by `roll + roll_offset` into helioprojective
//!    coordinates; the sidelobe ratio excludes `sidelobe_radius` arcsec around the peak.
//!    Maps are written to `map_dir` when set, for a later confidence audit with a
//!    `confidence_half_width` pixel box.
//!
//! ## Example
//!
//! ```rust,no_run
//! use flareloc::estimation_params::EstimationParams;
//!
//! let params = EstimationParams::builder()
//!     .half_window(30.0)
//!     .image_size(256)
//!     .fov_factor(2.6)
//!     .build()
//!     .unwrap();
//! println!("{params:#}");
//! ```
use std::cmp::Ordering::{Equal, Greater, Less};
use std::fmt;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::constants::{ArcSec, Degree, Second};
use crate::detector::EnergyRange;
use crate::flareloc_errors::FlareLocError;
use crate::observers::ObserverName;
use crate::quality::confidence::DEFAULT_HALF_WIDTH;
use crate::quality::DEFAULT_EXCLUSION_RADIUS;
use crate::subcollimator::ResolutionBand;

/// Configuration of the per-flare pipeline.
///
/// Fields
/// -----------------
/// **Window selection**
/// * `half_window` – half-width (s) of the time window around the flare peak.
/// * `nominal_energy` – energy range (keV) without attenuator.
/// * `attenuated_energy` – energy range (keV) when the attenuator is inserted.
///
/// **Visibilities**
/// * `prior_location` – assumed flare location in the native frame (arcsec).
/// * `no_shadowing` – skip the grid transmission correction at the prior location.
/// * `band` – subcollimators admitted to imaging.
///
/// **Imaging**
/// * `image_size` – number of pixels per side.
/// * `fov_factor` – field of view in apparent solar radii.
/// * `roll_offset` – angle (deg) added to the roll between native and helioprojective axes.
/// * `imager` – observer carrying the imager, looked up in the ephemeris.
///
/// **Quality**
/// * `sidelobe_radius` – angular exclusion radius (arcsec) of the sidelobe ratio.
/// * `confidence_half_width` – pixel half-width of the confidence-check box.
/// * `map_dir` – directory receiving one FITS map per flare, if any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimationParams {
    // --- Window selection ---
    pub half_window: Second,
    pub nominal_energy: EnergyRange,
    pub attenuated_energy: EnergyRange,

    // --- Visibilities ---
    pub prior_location: (ArcSec, ArcSec),
    pub no_shadowing: bool,
    pub band: ResolutionBand,

    // --- Imaging ---
    pub image_size: usize,
    pub fov_factor: f64,
    pub roll_offset: Degree,
    pub imager: ObserverName,

    // --- Quality ---
    pub sidelobe_radius: ArcSec,
    pub confidence_half_width: usize,
    pub map_dir: Option<Utf8PathBuf>,
}

impl EstimationParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fluent builder starting from the default values.
    pub fn builder() -> EstimationParamsBuilder {
        EstimationParamsBuilder::new()
    }

    /// Energy range to use given the attenuator state.
    pub fn energy_range(&self, attenuator: bool) -> EnergyRange {
        if attenuator {
            self.attenuated_energy
        } else {
            self.nominal_energy
        }
    }
}

impl Default for EstimationParams {
    fn default() -> Self {
        EstimationParams {
            half_window: 20.0,
            nominal_energy: EnergyRange::new(4.0, 16.0),
            attenuated_energy: EnergyRange::new(4.0, 25.0),

            prior_location: (0.0, 0.0),
            no_shadowing: true,
            band: ResolutionBand::coarse(),

            image_size: 512,
            fov_factor: 2.6,
            roll_offset: 90.0,
            imager: ObserverName::SolarOrbiter,

            sidelobe_radius: DEFAULT_EXCLUSION_RADIUS,
            confidence_half_width: DEFAULT_HALF_WIDTH,
            map_dir: None,
        }
    }
}

/// Builder for [`EstimationParams`], with validation.
#[derive(Debug, Clone, Default)]
pub struct EstimationParamsBuilder {
    params: EstimationParams,
}

impl EstimationParamsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    // --- Window selection ---
    pub fn half_window(mut self, v: Second) -> Self {
        self.params.half_window = v;
        self
    }

    pub fn nominal_energy(mut self, v: EnergyRange) -> Self {
        self.params.nominal_energy = v;
        self
    }

    pub fn attenuated_energy(mut self, v: EnergyRange) -> Self {
        self.params.attenuated_energy = v;
        self
    }

    // --- Visibilities ---
    pub fn prior_location(mut self, v: (ArcSec, ArcSec)) -> Self {
        self.params.prior_location = v;
        self
    }

    pub fn no_shadowing(mut self, v: bool) -> Self {
        self.params.no_shadowing = v;
        self
    }

    pub fn band(mut self, v: ResolutionBand) -> Self {
        self.params.band = v;
        self
    }

    // --- Imaging ---
    pub fn image_size(mut self, v: usize) -> Self {
        self.params.image_size = v;
        self
    }

    pub fn fov_factor(mut self, v: f64) -> Self {
        self.params.fov_factor = v;
        self
    }

    pub fn roll_offset(mut self, v: Degree) -> Self {
        self.params.roll_offset = v;
        self
    }

    pub fn imager(mut self, v: ObserverName) -> Self {
        self.params.imager = v;
        self
    }

    // --- Quality ---
    pub fn sidelobe_radius(mut self, v: ArcSec) -> Self {
        self.params.sidelobe_radius = v;
        self
    }

    pub fn confidence_half_width(mut self, v: usize) -> Self {
        self.params.confidence_half_width = v;
        self
    }

    pub fn map_dir(mut self, v: impl Into<Utf8PathBuf>) -> Self {
        self.params.map_dir = Some(v.into());
        self
    }

    // ---- Numeric helpers for PartialOrd (NaN is invalid) ----

    #[inline]
    fn gt0(x: f64) -> bool {
        x.partial_cmp(&0.0) == Some(Greater)
    }

    #[inline]
    fn ge0(x: f64) -> bool {
        matches!(x.partial_cmp(&0.0), Some(Greater) | Some(Equal))
    }

    #[inline]
    fn lt(a: f64, b: f64) -> bool {
        a.partial_cmp(&b) == Some(Less)
    }

    fn check_energy(name: &str, e: &EnergyRange) -> Result<(), FlareLocError> {
        if Self::ge0(e.low) && Self::lt(e.low, e.high) && e.high.is_finite() {
            Ok(())
        } else {
            Err(FlareLocError::InvalidParameter(format!(
                "{name} must satisfy 0 <= low < high, got {e}"
            )))
        }
    }

    /// Validate and produce the [`EstimationParams`].
    ///
    /// Validation rules
    /// -----------------
    /// * `half_window > 0`, `fov_factor > 0`, `sidelobe_radius >= 0`.
    /// * Both energy ranges satisfy `0 <= low < high`.
    /// * `image_size >= 1`, `confidence_half_width >= 1`.
    /// * `band` is not empty.
    /// * `prior_location` and `roll_offset` are finite.
    ///
    /// Return
    /// ----------
    /// * The parameters, or [`FlareLocError::InvalidParameter`] naming the first
    ///   rule that fails.
    pub fn build(self) -> Result<EstimationParams, FlareLocError> {
        let p = &self.params;

        if !Self::gt0(p.half_window) {
            return Err(FlareLocError::InvalidParameter(
                "half_window must be > 0".into(),
            ));
        }
        Self::check_energy("nominal_energy", &p.nominal_energy)?;
        Self::check_energy("attenuated_energy", &p.attenuated_energy)?;

        if !(p.prior_location.0.is_finite() && p.prior_location.1.is_finite()) {
            return Err(FlareLocError::InvalidParameter(
                "prior_location must be finite".into(),
            ));
        }
        if p.band.is_empty() {
            return Err(FlareLocError::InvalidParameter(format!(
                "resolution band {} has no subcollimator",
                p.band.name
            )));
        }

        if p.image_size == 0 {
            return Err(FlareLocError::InvalidParameter(
                "image_size must be >= 1".into(),
            ));
        }
        if !Self::gt0(p.fov_factor) || !p.fov_factor.is_finite() {
            return Err(FlareLocError::InvalidParameter(
                "fov_factor must be finite and > 0".into(),
            ));
        }
        if !p.roll_offset.is_finite() {
            return Err(FlareLocError::InvalidParameter(
                "roll_offset must be finite".into(),
            ));
        }

        if !Self::ge0(p.sidelobe_radius) {
            return Err(FlareLocError::InvalidParameter(
                "sidelobe_radius must be >= 0".into(),
            ));
        }
        if p.confidence_half_width == 0 {
            return Err(FlareLocError::InvalidParameter(
                "confidence_half_width must be >= 1".into(),
            ));
        }

        Ok(self.params)
    }
}

impl fmt::Display for EstimationParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            const PARAM_COL: usize = 46;
            writeln!(f, "Flare Estimation Parameters")?;
            writeln!(f, "---------------------------")?;

            macro_rules! line {
                ($fmt:expr, $val:expr, $comment:expr) => {{
                    let s = format!($fmt, $val);
                    let pad = if s.chars().count() < PARAM_COL {
                        " ".repeat(PARAM_COL - s.chars().count())
                    } else {
                        " ".to_string()
                    };
                    writeln!(f, "  {}{}# {}", s, pad, $comment)
                }};
            }

            writeln!(f, "[Window selection]")?;
            line!("half_window       = {:.1} s", self.half_window, "Half-width around the peak time")?;
            line!("nominal_energy    = {}", self.nominal_energy, "Energy range, attenuator out")?;
            line!("attenuated_energy = {}", self.attenuated_energy, "Energy range, attenuator in")?;

            writeln!(f, "\n[Visibilities]")?;
            line!(
                "prior_location    = {}",
                format!("({:.1}, {:.1})\"", self.prior_location.0, self.prior_location.1),
                "Phase reference of raw visibilities"
            )?;
            line!("no_shadowing      = {}", self.no_shadowing, "Skip grid transmission correction")?;
            line!("band              = {}", self.band.name, "Resolution band used for imaging")?;

            writeln!(f, "\n[Imaging]")?;
            line!("image_size        = {} px", self.image_size, "Pixels per side")?;
            line!("fov_factor        = {:.2}", self.fov_factor, "Field of view in solar radii")?;
            line!("roll_offset       = {:.1}°", self.roll_offset, "Native to helioprojective offset")?;
            line!("imager            = {}", self.imager, "Observer carrying the imager")?;

            writeln!(f, "\n[Quality]")?;
            line!("sidelobe_radius   = {:.1}\"", self.sidelobe_radius, "Sidelobe exclusion radius")?;
            line!("confidence_hw     = {} px", self.confidence_half_width, "Confidence-check box half-width")?;
            line!(
                "map_dir           = {}",
                self.map_dir.as_deref().map_or("-", |d| d.as_str()),
                "Directory of persisted maps"
            )?;

            Ok(())
        } else {
            write!(
                f,
                "EstimationParams(window=±{:.1}s, energy={}/{}, band={}, image={}px, fov={:.2}R, roll_offset={:.1}°, sidelobe_r={:.0}\", box_hw={}px)",
                self.half_window,
                self.nominal_energy,
                self.attenuated_energy,
                self.band.name,
                self.image_size,
                self.fov_factor,
                self.roll_offset,
                self.sidelobe_radius,
                self.confidence_half_width,
            )
        }
    }
}

#[cfg(test)]
mod estimation_params_test {
    use super::*;
    use crate::subcollimator::SubcollimatorId;

    #[test]
    fn test_defaults_are_valid() {
        let params = EstimationParams::builder().build().unwrap();
        assert_eq!(params, EstimationParams::default());
        assert_eq!(params.band.len(), 12);
        assert_eq!(params.energy_range(true), EnergyRange::new(4.0, 25.0));
        assert_eq!(params.energy_range(false), EnergyRange::new(4.0, 16.0));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let bad = [
            EstimationParams::builder().half_window(0.0),
            EstimationParams::builder().half_window(f64::NAN),
            EstimationParams::builder().nominal_energy(EnergyRange::new(16.0, 4.0)),
            EstimationParams::builder().attenuated_energy(EnergyRange::new(-1.0, 4.0)),
            EstimationParams::builder().prior_location((f64::INFINITY, 0.0)),
            EstimationParams::builder().band(ResolutionBand::new("empty", Vec::<SubcollimatorId>::new())),
            EstimationParams::builder().image_size(0),
            EstimationParams::builder().fov_factor(-2.6),
            EstimationParams::builder().roll_offset(f64::NAN),
            EstimationParams::builder().sidelobe_radius(-1.0),
            EstimationParams::builder().confidence_half_width(0),
        ];
        for builder in bad {
            assert!(matches!(
                builder.build(),
                Err(FlareLocError::InvalidParameter(_))
            ));
        }
    }

    #[test]
    fn test_display_variants() {
        let params = EstimationParams::builder().map_dir("/tmp/maps").build().unwrap();
        let compact = format!("{params}");
        assert!(compact.starts_with("EstimationParams(window=±20.0s"));
        let pretty = format!("{params:#}");
        assert!(pretty.contains("[Imaging]"));
        assert!(pretty.contains("/tmp/maps"));
    }
}
