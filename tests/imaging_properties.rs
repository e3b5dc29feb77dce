mod common;

use approx::assert_relative_eq;
use rand::{rngs::StdRng, Rng, SeedableRng};

use flareloc::detector::meta_pixel::extract_meta_pixels;
use flareloc::detector::EnergyRange;
use flareloc::imaging::map::MapWcs;
use flareloc::imaging::peak::argmax;
use flareloc::imaging::{back_project, ImagingGeometry};
use flareloc::subcollimator::{GeometryTable, ResolutionBand, SubcollimatorId};
use flareloc::time::TimeWindow;
use flareloc::visibility::calibration::{calibrate, CalibrationTable};
use flareloc::visibility::selection::select_band;
use flareloc::visibility::{synthesize_visibilities, VisibilitySet};

use common::{coarse_iscs, init_logger, peak_time, point_sources_data};

/// Calibrated visibilities of point sources, phased on the optical axis.
fn visibilities(iscs: &[SubcollimatorId], sources: &[((f64, f64), f64)]) -> VisibilitySet {
    let geometry = GeometryTable::default_imaging();
    let data = point_sources_data(&geometry, iscs, sources, peak_time(), 0);
    let window = TimeWindow::around(peak_time(), 20.0);
    let meta = extract_meta_pixels(&data, &window, &EnergyRange::new(4.0, 16.0)).unwrap();
    let raw = synthesize_visibilities(&meta, &geometry, (0.0, 0.0), true).unwrap();
    calibrate(&raw, (0.0, 0.0), &CalibrationTable::identity(&geometry)).unwrap()
}

#[test]
fn test_three_subcollimator_point_source_peak() {
    init_logger();
    let geometry = ImagingGeometry::new(64, 30.0).unwrap();
    // Center of pixel [40, 20]
    let source = geometry.offset(40, 20);
    let set = visibilities(&[3, 16, 24].map(SubcollimatorId), &[(source, 1000.0)]);
    assert_eq!(set.len(), 3);

    let map = back_project(&set, &geometry);
    assert_eq!(map.dim(), (64, 64));
    let (row, col, _) = argmax(&map.data).unwrap();
    assert!(row.abs_diff(40) <= 1 && col.abs_diff(20) <= 1, "peak at [{row}, {col}]");
}

#[test]
fn test_coarse_band_point_source_peak_value() {
    let geometry = ImagingGeometry::new(65, 40.0).unwrap();
    let source = geometry.offset(10, 50);
    let set = visibilities(&coarse_iscs(), &[(source, 500.0)]);
    let set = select_band(&set, &ResolutionBand::coarse());
    assert_eq!(set.len(), 12);

    let map = back_project(&set, &geometry);
    let (row, col, value) = argmax(&map.data).unwrap();
    assert_eq!((row, col), (10, 50));

    // Every fringe peaks at the source: value = Σ w · flux / live_time
    let expected: f64 = set.iter().map(|v| v.weight * v.amplitude.norm()).sum();
    assert_relative_eq!(value, expected, max_relative = 1e-9);
}

#[test]
fn test_back_projection_is_linear() {
    let geometry = ImagingGeometry::new(48, 35.0).unwrap();
    let set = visibilities(
        &coarse_iscs(),
        &[((-300.0, 120.0), 700.0), ((250.0, 400.0), 300.0)],
    );

    let base = back_project(&set, &geometry);
    for factor in [0.0, 0.5, 3.0, -2.0] {
        let scaled = back_project(&set.scaled(factor), &geometry);
        for (a, b) in scaled.data.iter().zip(base.data.iter()) {
            assert_relative_eq!(*a, factor * b, epsilon = 1e-9, max_relative = 1e-12);
        }
    }
}

#[test]
fn test_empty_set_gives_zero_map() {
    let geometry = ImagingGeometry::new(16, 10.0).unwrap();
    let set = visibilities(&coarse_iscs(), &[((0.0, 0.0), 100.0)]);
    let empty = select_band(
        &set,
        &ResolutionBand::new("none", Vec::new()),
    );
    let map = back_project(&empty, &geometry);
    assert!(map.data.iter().all(|v| *v == 0.0));
}

#[test]
fn test_wcs_round_trip_random() {
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..200 {
        let npix = rng.random_range(2..600);
        let center = (
            rng.random_range(-2000.0..2000.0),
            rng.random_range(-2000.0..2000.0),
        );
        let scale = rng.random_range(0.5..50.0);
        let rotation = rng.random_range(-180.0..180.0);
        let wcs = MapWcs::centered(npix, center, scale, rotation);

        let pixel = (
            rng.random_range(0.0..npix as f64),
            rng.random_range(0.0..npix as f64),
        );
        let back = wcs.world_to_pixel(wcs.pixel_to_world(pixel));
        assert_relative_eq!(back.0, pixel.0, epsilon = 1e-8);
        assert_relative_eq!(back.1, pixel.1, epsilon = 1e-8);
    }
}
