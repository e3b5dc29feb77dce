//! # Flare requests and location estimates
//!
//! - [`FlareRequest`] – everything the pipeline needs for one flare: an identifier,
//!   the peak time and the raw count series.
//! - [`FlareLocationEstimate`] – the per-flare result record.
//!
//! A failed flare is represented by a NaN-filled record carrying the
//! [`ErrorKind`] that stopped it ([`FlareLocationEstimate::failed`]), so that batch
//! outputs can be flattened into one table without losing failures.
use std::fmt;

use hifitime::Epoch;
use serde::{Deserialize, Serialize};

use crate::constants::{ArcSec, FlareId};
use crate::detector::{EnergyRange, RawCountData};
use crate::flareloc_errors::ErrorKind;
use crate::time::TimeWindow;

/// One flare to localize.
#[derive(Debug, Clone)]
pub struct FlareRequest {
    pub id: FlareId,
    /// Time of the flare peak, center of the imaging window
    pub peak_time: Epoch,
    pub data: RawCountData,
}

impl FlareRequest {
    pub fn new(id: impl Into<FlareId>, peak_time: Epoch, data: RawCountData) -> Self {
        FlareRequest {
            id: id.into(),
            peak_time,
            data,
        }
    }
}

/// Location estimate of one flare.
///
/// Fields
/// -----------------
/// * `id` – flare identifier.
/// * `native` – peak location in the imager native frame (arcsec).
/// * `hpc` – peak location in the helioprojective frame of the imager (arcsec).
/// * `peak_value` – map value at the peak.
/// * `sidelobe_ratio` – strongest secondary peak over the primary peak.
/// * `attenuator` – whether the attenuator was inserted during the window.
/// * `energy` – energy range used.
/// * `n_visibilities` – number of visibilities back-projected.
/// * `window` – union of the sample intervals that contributed (not serialized).
/// * `error` – `None` for a successful estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlareLocationEstimate {
    pub id: FlareId,
    pub native: (ArcSec, ArcSec),
    pub hpc: (ArcSec, ArcSec),
    pub peak_value: f64,
    pub sidelobe_ratio: f64,
    pub attenuator: bool,
    pub energy: Option<EnergyRange>,
    pub n_visibilities: usize,
    #[serde(skip)]
    pub window: Option<TimeWindow>,
    pub error: Option<ErrorKind>,
}

impl FlareLocationEstimate {
    /// NaN-filled record of a flare whose pipeline stopped with `kind`.
    pub fn failed(id: FlareId, kind: ErrorKind) -> Self {
        FlareLocationEstimate {
            id,
            native: (f64::NAN, f64::NAN),
            hpc: (f64::NAN, f64::NAN),
            peak_value: f64::NAN,
            sidelobe_ratio: f64::NAN,
            attenuator: false,
            energy: None,
            n_visibilities: 0,
            window: None,
            error: Some(kind),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

impl fmt::Display for FlareLocationEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(kind) = self.error {
            return write!(f, "Flare {}: failed ({kind})", self.id);
        }
        write!(
            f,
            "Flare {}: native=({:.1}\", {:.1}\") hpc=({:.1}\", {:.1}\") sidelobe={:.3}{}",
            self.id,
            self.native.0,
            self.native.1,
            self.hpc.0,
            self.hpc.1,
            self.sidelobe_ratio,
            if self.attenuator { " [att]" } else { "" }
        )?;
        if f.alternate() {
            if let Some(energy) = &self.energy {
                write!(f, "\n  energy: {energy}")?;
            }
            write!(f, "\n  visibilities: {}", self.n_visibilities)?;
            if let Some(window) = &self.window {
                write!(f, "\n  window: {window}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod flare_estimate_test {
    use super::*;

    #[test]
    fn test_failed_record_is_nan_filled() {
        let record = FlareLocationEstimate::failed(FlareId::Int(7), ErrorKind::DataGap);
        assert!(!record.is_ok());
        assert!(record.native.0.is_nan() && record.native.1.is_nan());
        assert!(record.hpc.0.is_nan() && record.hpc.1.is_nan());
        assert!(record.sidelobe_ratio.is_nan());
        assert_eq!(record.to_string(), "Flare 7: failed (data gap)");
    }

    #[test]
    fn test_display_success() {
        let record = FlareLocationEstimate {
            id: "f1".into(),
            native: (10.0, -20.0),
            hpc: (20.0, 10.0),
            peak_value: 3.0,
            sidelobe_ratio: 0.25,
            attenuator: true,
            energy: Some(EnergyRange::new(4.0, 25.0)),
            n_visibilities: 12,
            window: None,
            error: None,
        };
        assert_eq!(
            record.to_string(),
            "Flare f1: native=(10.0\", -20.0\") hpc=(20.0\", 10.0\") sidelobe=0.250 [att]"
        );
        assert!(format!("{record:#}").contains("visibilities: 12"));
    }
}
