//! # Quality metrics of a back-projected map
//!
//! Sparse spatial-frequency sampling leaves sidelobes in a dirty map. Two independent
//! checks flag maps whose brightest pixel may be a sidelobe rather than the flare:
//!
//! - [`sidelobe_ratio`] – angular exclusion around the peak, computed on the
//!   in-memory map right after imaging;
//! - [`confidence`] – pixel-box exclusion around the peak, run later on persisted
//!   map files.
//!
//! The two exclusions use different units (arcsec vs. pixels) and are configured
//! separately.
pub mod confidence;

use crate::constants::ArcSec;
use crate::flareloc_errors::FlareLocError;
use crate::imaging::map::Map;
use crate::imaging::peak::argmax;
use crate::ref_system::angular_separation;

/// Default exclusion radius around the peak, arcsec
pub const DEFAULT_EXCLUSION_RADIUS: ArcSec = 200.0;

/// Ratio of the strongest secondary peak to the primary peak.
///
/// Every pixel whose angular separation from the peak is at most `radius` is set to
/// zero on a copy of the map; the ratio is the new maximum over the original maximum.
///
/// Arguments
/// -----------------
/// * `map`: back-projected map (not modified).
/// * `radius`: exclusion radius around the peak, arcsec.
///
/// Return
/// ----------
/// * The ratio in `[0, 1]`: `0` when nothing positive remains, `1` when a tied
///   maximum lies outside the exclusion zone.
///
/// Errors
/// ----------
/// * [`FlareLocError::DegenerateImage`] if the map has no finite pixel or a
///   non-positive maximum.
pub fn sidelobe_ratio(map: &Map, radius: ArcSec) -> Result<f64, FlareLocError> {
    let (row, col, peak) = argmax(&map.data)?;
    if peak <= 0.0 {
        return Err(FlareLocError::DegenerateImage(format!(
            "non-positive image maximum {peak:e}"
        )));
    }
    let peak_world = map.index_to_world(row, col);

    let mut masked = map.data.clone();
    for ((r, c), value) in masked.indexed_iter_mut() {
        if angular_separation(map.index_to_world(r, c), peak_world) <= radius {
            *value = 0.0;
        }
    }

    let (_, _, remainder) = argmax(&masked)?;
    Ok(remainder / peak)
}

#[cfg(test)]
mod quality_test {
    use super::*;
    use crate::imaging::map::{MapFrame, MapWcs};
    use approx::assert_relative_eq;
    use ndarray::Array2;

    fn grid(npix: usize, scale: f64) -> Map {
        Map::new(
            Array2::zeros((npix, npix)),
            MapWcs::centered(npix, (0.0, 0.0), scale, 0.0),
            MapFrame::Native,
        )
    }

    #[test]
    fn test_single_peak_with_whole_grid_excluded() {
        let mut map = grid(256, 10.0);
        map.data[[100, 100]] = 100.0;
        assert_eq!(sidelobe_ratio(&map, 1e6).unwrap(), 0.0);
    }

    #[test]
    fn test_zero_radius_gives_second_highest() {
        let mut map = grid(256, 10.0);
        map.data[[100, 100]] = 100.0;
        map.data[[10, 200]] = 37.0;
        map.data[[101, 100]] = 12.0;
        assert_relative_eq!(sidelobe_ratio(&map, 0.0).unwrap(), 0.37);
    }

    #[test]
    fn test_nearby_secondary_is_excluded() {
        let mut map = grid(128, 10.0);
        map.data[[60, 60]] = 50.0;
        map.data[[62, 60]] = 49.0; // 20" away
        map.data[[60, 120]] = 10.0; // 600" away
        assert_relative_eq!(sidelobe_ratio(&map, 200.0).unwrap(), 0.2);
    }

    #[test]
    fn test_tied_peak_outside_gives_one() {
        let mut map = grid(64, 20.0);
        map.data[[5, 5]] = 8.0;
        map.data[[60, 60]] = 8.0;
        assert_eq!(sidelobe_ratio(&map, 200.0).unwrap(), 1.0);
    }

    #[test]
    fn test_input_is_not_modified() {
        let mut map = grid(32, 10.0);
        map.data[[3, 3]] = 5.0;
        let before = map.clone();
        sidelobe_ratio(&map, 500.0).unwrap();
        assert_eq!(map, before);
    }

    #[test]
    fn test_degenerate_maps() {
        assert!(matches!(
            sidelobe_ratio(&grid(8, 1.0), 10.0),
            Err(FlareLocError::DegenerateImage(_))
        ));
        let mut negative = grid(8, 1.0);
        negative.data.fill(-1.0);
        assert!(sidelobe_ratio(&negative, 10.0).is_err());
    }

    #[test]
    fn test_ratio_is_bounded_on_sinusoids() {
        let mut map = grid(64, 8.0);
        for ((r, c), v) in map.data.indexed_iter_mut() {
            *v = (r as f64 * 0.3).cos() + (c as f64 * 0.17).sin();
        }
        let ratio = sidelobe_ratio(&map, DEFAULT_EXCLUSION_RADIUS).unwrap();
        assert!((0.0..=1.0).contains(&ratio));
    }
}
