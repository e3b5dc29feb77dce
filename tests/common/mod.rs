#![allow(dead_code)]

use std::sync::Arc;

use hifitime::{Duration, Epoch};

use flareloc::constants::{ArcSec, DPI};
use flareloc::detector::{CountSample, EnergyRange, PhaseQuadrant, RawCountData, Subfield};
use flareloc::estimation_params::EstimationParams;
use flareloc::flareloc::FlareLoc;
use flareloc::observers::ephemeris_table::EphemerisTable;
use flareloc::observers::{InstrumentAttitude, ObserverPosition};
use flareloc::subcollimator::{GeometryTable, SubcollimatorGeometry, SubcollimatorId};
use flareloc::visibility::calibration::CalibrationTable;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn peak_time() -> Epoch {
    Epoch::from_gregorian_utc_hms(2022, 3, 30, 17, 30, 0)
}

/// Four quadrant samples of a point source of `flux` counts at `source` (native
/// frame, arcsec), starting at `start` and lasting 4 s, background 2 counts.
pub fn quadrant_samples(
    geom: &SubcollimatorGeometry,
    sources: &[((ArcSec, ArcSec), f64)],
    start: Epoch,
    rcr: u8,
) -> Vec<CountSample> {
    let (u, v) = geom.uv();
    PhaseQuadrant::ALL
        .iter()
        .map(|&quadrant| {
            let k = quadrant.index() as f64;
            let modulated: f64 = sources
                .iter()
                .map(|&((x, y), flux)| {
                    let phase = DPI * (u * x + v * y);
                    flux * (1.0 + 0.5 * (phase + k * DPI / 4.0).cos())
                })
                .sum();
            CountSample {
                start,
                duration: 4.0,
                live_fraction: 0.9,
                channel: EnergyRange::new(6.0, 10.0),
                subfield: Subfield {
                    isc: geom.id,
                    quadrant,
                },
                counts: modulated + 2.0,
                background: 2.0,
                rcr,
            }
        })
        .collect()
}

/// Raw counts of point sources seen by `iscs`: five 4 s accumulations from
/// `peak − 10 s` to `peak + 10 s`.
pub fn point_sources_data(
    geometry: &GeometryTable,
    iscs: &[SubcollimatorId],
    sources: &[((ArcSec, ArcSec), f64)],
    peak: Epoch,
    rcr: u8,
) -> RawCountData {
    let mut samples = Vec::new();
    for step in 0..5 {
        let start = peak + Duration::from_seconds(-10.0 + 4.0 * step as f64);
        for isc in iscs {
            if let Some(geom) = geometry.get(*isc) {
                samples.extend(quadrant_samples(geom, sources, start, rcr));
            }
        }
    }
    RawCountData::new(samples)
}

pub fn coarse_iscs() -> Vec<SubcollimatorId> {
    [3, 20, 22, 16, 14, 32, 21, 26, 4, 24, 8, 28]
        .map(SubcollimatorId)
        .to_vec()
}

pub fn attitude() -> InstrumentAttitude {
    InstrumentAttitude {
        roll: 12.0,
        pointing: (35.0, -60.0),
    }
}

pub fn ephemeris(imager: ObserverPosition) -> Arc<EphemerisTable> {
    Arc::new(EphemerisTable::constant(
        vec![imager, ObserverPosition::earth_nominal()],
        attitude(),
    ))
}

pub fn flareloc(params: EstimationParams, imager: ObserverPosition) -> FlareLoc {
    let geometry = GeometryTable::default_imaging();
    let calibration = CalibrationTable::identity(&geometry);
    FlareLoc::new(params, geometry, calibration, ephemeris(imager))
}
