//! Brightest-pixel localization.
//!
//! The scan is row-major and strict (`>`), so on exact ties the lowest row-major index
//! wins. NaN pixels never win. An all-zero map is not degenerate for this module: its
//! peak is the first pixel, and rejecting such results is left to the quality metrics.
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::constants::{ArcSec, Degree};
use crate::flareloc_errors::FlareLocError;
use crate::imaging::map::Map;
use crate::observers::InstrumentAttitude;
use crate::ref_system::native_to_hpc;

/// Position of the brightest pixel of a map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeakLocation {
    pub row: usize,
    pub col: usize,
    pub value: f64,
    /// World coordinate in the map's own frame
    pub native: (ArcSec, ArcSec),
    /// Helioprojective coordinate of the imaging spacecraft
    pub hpc: (ArcSec, ArcSec),
}

/// `[row, col]` and value of the maximum of `data`, ignoring NaNs.
///
/// Errors
/// ----------
/// * [`FlareLocError::DegenerateImage`] if `data` is empty or only holds NaNs.
pub fn argmax(data: &Array2<f64>) -> Result<(usize, usize, f64), FlareLocError> {
    let mut best: Option<((usize, usize), f64)> = None;
    for (idx, &value) in data.indexed_iter() {
        if value.is_nan() {
            continue;
        }
        match best {
            Some((_, current)) if value <= current => {}
            _ => best = Some((idx, value)),
        }
    }
    best.map(|((row, col), value)| (row, col, value))
        .ok_or_else(|| {
            FlareLocError::DegenerateImage(format!(
                "no finite pixel in a {}×{} image",
                data.nrows(),
                data.ncols()
            ))
        })
}

/// Locate the brightest pixel of a native-frame map.
///
/// Arguments
/// -----------------
/// * `map`: back-projected map in the native frame.
/// * `attitude`: roll and pointing of the imager.
/// * `roll_offset`: angle between the native axes and the rolled helioprojective axes.
///
/// Return
/// ----------
/// * The [`PeakLocation`], with native and helioprojective coordinates.
pub fn locate_peak(
    map: &Map,
    attitude: &InstrumentAttitude,
    roll_offset: Degree,
) -> Result<PeakLocation, FlareLocError> {
    let (row, col, value) = argmax(&map.data)?;
    let native = map.index_to_world(row, col);
    Ok(PeakLocation {
        row,
        col,
        value,
        native,
        hpc: native_to_hpc(native, attitude, roll_offset),
    })
}

#[cfg(test)]
mod peak_test {
    use super::*;
    use crate::imaging::map::{MapFrame, MapWcs};
    use approx::assert_relative_eq;

    #[test]
    fn test_ties_resolve_to_first_row_major() {
        let mut data = Array2::zeros((5, 5));
        data[[3, 1]] = 7.0;
        data[[1, 4]] = 7.0;
        data[[4, 0]] = 7.0;
        assert_eq!(argmax(&data).unwrap(), (1, 4, 7.0));
    }

    #[test]
    fn test_all_zero_map_peaks_at_first_pixel() {
        let data = Array2::zeros((4, 4));
        assert_eq!(argmax(&data).unwrap(), (0, 0, 0.0));
    }

    #[test]
    fn test_nan_pixels_are_ignored() {
        let mut data = Array2::from_elem((3, 3), f64::NAN);
        data[[2, 2]] = -1.0;
        assert_eq!(argmax(&data).unwrap(), (2, 2, -1.0));

        let all_nan = Array2::from_elem((3, 3), f64::NAN);
        assert!(matches!(argmax(&all_nan), Err(FlareLocError::DegenerateImage(_))));
        assert!(argmax(&Array2::zeros((0, 0))).is_err());
    }

    #[test]
    fn test_locate_peak_coordinates() {
        let mut data = Array2::zeros((11, 11));
        data[[7, 2]] = 3.0;
        let map = Map::new(data, MapWcs::centered(11, (50.0, 50.0), 10.0, 0.0), MapFrame::Native);
        let attitude = InstrumentAttitude {
            roll: 0.0,
            pointing: (0.0, 0.0),
        };
        let peak = locate_peak(&map, &attitude, 90.0).unwrap();
        assert_eq!((peak.row, peak.col), (7, 2));
        assert_eq!(peak.native, (20.0, 70.0));
        // 90° rotation: (x, y) → (−y, x)
        assert_relative_eq!(peak.hpc.0, -70.0, epsilon = 1e-9);
        assert_relative_eq!(peak.hpc.1, 20.0, epsilon = 1e-9);
    }
}
