//! # Visibility synthesis
//!
//! Turn a [`MetaPixelSet`] into complex spatial-frequency samples, one per
//! subcollimator with a complete set of phase quadrants.
//!
//! ## Moiré model
//!
//! The four quadrants `A, B, C, D` of a subcollimator sample its moiré pattern at
//! phase offsets `0°, 90°, 180°, 270°`. Their pairwise differences cancel the
//! unmodulated flux and leave the two quadratures of the modulation:
//!
//! ```text
//! V_axis = ((A − C) + i (B − D)) / live_time
//! ```
//!
//! `V_axis` is referenced to the optical axis. It is then re-referenced to the prior
//! flare location `p₀` (native frame, arcsec):
//!
//! ```text
//! V = V_axis · exp(2πi (u, v)·p₀)
//! ```
//!
//! and, unless shadowing is disabled, divided by the relative grid transmission
//! `T(p₀) / T(0)` (see [`SubcollimatorGeometry::transmission`]).
//!
//! ## See also
//! ------------
//! * [`calibration`] – gain/phase correction towards the map phase center.
//! * [`selection`] – restriction to a [`ResolutionBand`](crate::subcollimator::ResolutionBand).
pub mod calibration;
pub mod selection;

use std::fmt;

use num_complex::Complex64;

use crate::constants::{ArcSec, Visibilities, DPI};
use crate::detector::meta_pixel::MetaPixelSet;
use crate::detector::{EnergyRange, PhaseQuadrant, Subfield};
use crate::flareloc_errors::FlareLocError;
use crate::subcollimator::{GeometryTable, SubcollimatorGeometry, SubcollimatorId};
use crate::time::TimeWindow;

/// One spatial-frequency sample of the sky brightness.
///
/// `(u, v)` are in cycles per arcsec and always come from the subcollimator geometry,
/// never from the data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Visibility {
    pub isc: SubcollimatorId,
    pub u: f64,
    pub v: f64,
    pub amplitude: Complex64,
    /// Live-time weight in `[0, 1]`
    pub weight: f64,
}

impl Visibility {
    /// Phase factor `exp(2πi (u·x + v·y))` of a sky offset `(x, y)` in arcsec.
    pub fn fringe(&self, offset: (ArcSec, ArcSec)) -> Complex64 {
        Complex64::from_polar(1.0, DPI * (self.u * offset.0 + self.v * offset.1))
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "isc {:>2}  uv=({:+.5}, {:+.5})  |V|={:.4e}  arg={:+.4}  w={:.3}",
            self.isc,
            self.u,
            self.v,
            self.amplitude.norm(),
            self.amplitude.arg(),
            self.weight
        )
    }
}

/// Visibilities of one estimate with their phase reference.
///
/// Fields
/// -----------------
/// * `visibilities` – one entry per subcollimator, ordered by subcollimator id.
/// * `phase_center` – sky position (native frame, arcsec) the phases refer to.
/// * `window` – effective time window of the underlying counts.
/// * `energy` – energy range of the underlying counts.
#[derive(Debug, Clone)]
pub struct VisibilitySet {
    pub visibilities: Visibilities,
    pub phase_center: (ArcSec, ArcSec),
    pub window: TimeWindow,
    pub energy: EnergyRange,
}

impl VisibilitySet {
    pub fn len(&self) -> usize {
        self.visibilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visibilities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Visibility> {
        self.visibilities.iter()
    }

    pub fn get(&self, isc: SubcollimatorId) -> Option<&Visibility> {
        self.visibilities.iter().find(|v| v.isc == isc)
    }

    /// Same set with every amplitude multiplied by `factor`.
    pub fn scaled(&self, factor: f64) -> VisibilitySet {
        let mut out = self.clone();
        for vis in out.visibilities.iter_mut() {
            vis.amplitude *= factor;
        }
        out
    }
}

/// Relative transmission `T(p₀)/T(0)` of a grid pair.
///
/// Return
/// ----------
/// * The ratio, or [`FlareLocError::GridOpaque`] if the grid lets nothing through at `p₀`.
fn shadowing_factor(
    geometry: &SubcollimatorGeometry,
    prior: (ArcSec, ArcSec),
) -> Result<f64, FlareLocError> {
    let on_axis = geometry.transmission((0.0, 0.0));
    let at_prior = geometry.transmission(prior);
    if at_prior <= 0.0 || on_axis <= 0.0 {
        return Err(FlareLocError::GridOpaque {
            isc: geometry.id,
            transmission: at_prior,
        });
    }
    Ok(at_prior / on_axis)
}

/// Build the visibilities of one estimate.
///
/// Arguments
/// -----------------
/// * `meta`: meta pixels of the estimate.
/// * `geometry`: subcollimator geometry table.
/// * `prior`: assumed flare location in the native frame (arcsec).
/// * `no_shadowing`: skip the grid transmission correction.
///
/// Return
/// ----------
/// * A [`VisibilitySet`] phased on `prior`, carrying the effective window of `meta`.
///
/// Errors
/// ----------
/// * [`FlareLocError::GridOpaque`] if a grid is opaque at `prior` and shadowing is on.
///
/// Remarks
/// ----------
/// * Subcollimators unknown to `geometry`, missing a quadrant, or without live time
///   are skipped with a warning; the result may therefore be smaller than the set of
///   subcollimators present in `meta`.
pub fn synthesize_visibilities(
    meta: &MetaPixelSet,
    geometry: &GeometryTable,
    prior: (ArcSec, ArcSec),
    no_shadowing: bool,
) -> Result<VisibilitySet, FlareLocError> {
    let duration = meta.effective.duration_seconds();
    let mut visibilities = Visibilities::new();

    for isc in meta.subcollimators() {
        let Some(geom) = geometry.get(isc) else {
            log::warn!("subcollimator {isc} has no geometry entry, skipped");
            continue;
        };

        let quadrants: Option<Vec<_>> = PhaseQuadrant::ALL
            .iter()
            .map(|&quadrant| meta.get(&Subfield { isc, quadrant }))
            .collect();
        let Some(q) = quadrants else {
            log::warn!("subcollimator {} ({}) is missing a phase quadrant, skipped", isc, geom.label);
            continue;
        };

        let live_time = q.iter().map(|p| p.live_time).sum::<f64>() / 4.0;
        if live_time <= 0.0 {
            log::warn!("subcollimator {isc} has no live time, skipped");
            continue;
        }

        let on_axis = Complex64::new(
            q[0].net_counts - q[2].net_counts,
            q[1].net_counts - q[3].net_counts,
        ) / live_time;

        let (u, v) = geom.uv();
        let mut amplitude = on_axis * Complex64::from_polar(1.0, DPI * (u * prior.0 + v * prior.1));
        if !no_shadowing {
            amplitude /= shadowing_factor(geom, prior)?;
        }

        let weight = if duration > 0.0 {
            (live_time / duration).clamp(0.0, 1.0)
        } else {
            1.0
        };

        visibilities.push(Visibility {
            isc,
            u,
            v,
            amplitude,
            weight,
        });
    }

    log::debug!(
        "synthesized {} visibilities phased on ({:.1}, {:.1}) arcsec",
        visibilities.len(),
        prior.0,
        prior.1
    );

    Ok(VisibilitySet {
        visibilities,
        phase_center: prior,
        window: meta.effective,
        energy: meta.energy,
    })
}

#[cfg(test)]
mod visibility_test {
    use super::*;
    use crate::detector::meta_pixel::extract_meta_pixels;
    use crate::detector::{CountSample, RawCountData};
    use approx::assert_relative_eq;
    use hifitime::Epoch;

    /// Counts of a point source at `source` seen through `geom`, without shadowing.
    fn point_source(geom: &SubcollimatorGeometry, source: (f64, f64), flux: f64) -> Vec<CountSample> {
        let (u, v) = geom.uv();
        let phase = DPI * (u * source.0 + v * source.1);
        PhaseQuadrant::ALL
            .iter()
            .map(|&quadrant| {
                let k = quadrant.index() as f64;
                CountSample {
                    start: Epoch::from_gregorian_utc_hms(2023, 5, 1, 10, 0, 0),
                    duration: 4.0,
                    live_fraction: 1.0,
                    channel: EnergyRange::new(6.0, 7.0),
                    subfield: Subfield {
                        isc: geom.id,
                        quadrant,
                    },
                    counts: flux * (1.0 + 0.5 * (phase + k * DPI / 4.0).cos()) + 3.0,
                    background: 3.0,
                    rcr: 0,
                }
            })
            .collect()
    }

    fn meta_for(samples: Vec<CountSample>) -> MetaPixelSet {
        let data = RawCountData::new(samples);
        let window = TimeWindow::around(data.samples[0].start, 10.0);
        extract_meta_pixels(&data, &window, &EnergyRange::new(4.0, 16.0)).unwrap()
    }

    #[test]
    fn test_phase_follows_source_offset_from_prior() {
        let table = GeometryTable::default_imaging();
        let geom = *table.get(SubcollimatorId(3)).unwrap();
        let source = (120.0, -340.0);
        let meta = meta_for(point_source(&geom, source, 1000.0));

        let set = synthesize_visibilities(&meta, &table, source, true).unwrap();
        assert_eq!(set.len(), 1);
        let vis = set.get(SubcollimatorId(3)).unwrap();
        // Phased on the true position: the visibility is real and positive.
        assert!(vis.amplitude.re > 0.0);
        assert_relative_eq!(vis.amplitude.im, 0.0, epsilon = 1e-9);
        assert_relative_eq!(vis.amplitude.re, 2.0 * 0.5 * 1000.0 / 4.0, epsilon = 1e-9);
        assert_relative_eq!(vis.weight, 1.0);
    }

    #[test]
    fn test_incomplete_subcollimator_is_skipped() {
        let table = GeometryTable::default_imaging();
        let g3 = *table.get(SubcollimatorId(3)).unwrap();
        let g20 = *table.get(SubcollimatorId(20)).unwrap();
        let mut samples = point_source(&g3, (0.0, 0.0), 500.0);
        samples.extend(point_source(&g20, (0.0, 0.0), 500.0).into_iter().take(3));

        let set = synthesize_visibilities(&meta_for(samples), &table, (0.0, 0.0), false).unwrap();
        assert_eq!(set.len(), 1);
        assert!(set.get(SubcollimatorId(20)).is_none());
    }

    #[test]
    fn test_shadowing_raises_amplitude_off_axis() {
        let table = GeometryTable::default_imaging();
        let geom = *table.get(SubcollimatorId(24)).unwrap();
        let meta = meta_for(point_source(&geom, (0.0, 0.0), 800.0));
        let prior = (600.0, 600.0);

        let plain = synthesize_visibilities(&meta, &table, prior, true).unwrap();
        let shadowed = synthesize_visibilities(&meta, &table, prior, false).unwrap();
        let ratio = geom.transmission(prior) / geom.transmission((0.0, 0.0));
        assert_relative_eq!(
            shadowed.visibilities[0].amplitude.norm(),
            plain.visibilities[0].amplitude.norm() / ratio,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_opaque_grid_is_an_error() {
        let mut table = GeometryTable::new();
        let mut geom = *GeometryTable::default_imaging().get(SubcollimatorId(3)).unwrap();
        geom.thickness_ratio = 1e6;
        table.insert(geom);
        let meta = meta_for(point_source(&geom, (0.0, 0.0), 100.0));

        let err = synthesize_visibilities(&meta, &table, (500.0, 500.0), false).unwrap_err();
        assert!(matches!(err, FlareLocError::GridOpaque { .. }));
        assert!(synthesize_visibilities(&meta, &table, (500.0, 500.0), true).is_ok());
    }
}
