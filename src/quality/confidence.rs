//! # Map-based confidence check
//!
//! Second-pass audit of persisted maps: blank a square pixel box around the brightest
//! pixel and compare what remains with the peak.
//!
//! ```text
//! box       = [row − hw, row + hw) × [col − hw, col + hw), clamped to the array
//! verdict   = Pass  if max(remainder) < 0.9 · max(map)
//!             Fail  otherwise
//! ```
//!
//! The box is expressed in pixels, independently of the angular exclusion of
//! [`sidelobe_ratio`](crate::quality::sidelobe_ratio).
use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};
use ndarray::{s, Array2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::flareloc_errors::FlareLocError;
use crate::imaging::fits::read_map;
use crate::imaging::peak::argmax;

/// Default half-width of the exclusion box, pixels
pub const DEFAULT_HALF_WIDTH: usize = 20;

/// Remainder-to-peak ratio at or above which a map fails
pub const FAIL_THRESHOLD: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Confidence {
    Pass,
    Fail,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Confidence::Pass => f.write_str("pass"),
            Confidence::Fail => f.write_str("fail"),
        }
    }
}

/// Outcome of the check on one map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceReport {
    pub verdict: Confidence,
    pub peak: (usize, usize),
    pub peak_value: f64,
    pub remainder_max: f64,
}

/// Run the confidence check on an image.
///
/// Arguments
/// -----------------
/// * `data`: image, indexed `[row, col]`.
/// * `half_width`: half-width of the exclusion box, pixels.
///
/// Errors
/// ----------
/// * [`FlareLocError::DegenerateImage`] if the image has no finite pixel.
pub fn check_image(data: &Array2<f64>, half_width: usize) -> Result<ConfidenceReport, FlareLocError> {
    let (row, col, peak_value) = argmax(data)?;
    let (rows, cols) = data.dim();

    let mut remainder = data.clone();
    remainder
        .slice_mut(s![
            row.saturating_sub(half_width)..(row + half_width).min(rows),
            col.saturating_sub(half_width)..(col + half_width).min(cols)
        ])
        .fill(0.0);

    let remainder_max = remainder
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .fold(f64::NEG_INFINITY, f64::max);

    let verdict = if remainder_max < FAIL_THRESHOLD * peak_value {
        Confidence::Pass
    } else {
        Confidence::Fail
    };

    Ok(ConfidenceReport {
        verdict,
        peak: (row, col),
        peak_value,
        remainder_max,
    })
}

/// Load a map file and run [`check_image`] on it.
pub fn check_map_file(path: &Utf8Path, half_width: usize) -> Result<ConfidenceReport, FlareLocError> {
    let map = read_map(path)?;
    check_image(&map.data, half_width)
}

/// Check every `*.fits` map of a directory in parallel.
///
/// Return
/// ----------
/// * One `(path, result)` per file, sorted by path. A file that fails to load or
///   check does not stop the others.
///
/// Errors
/// ----------
/// * [`FlareLocError::IoError`] if the directory itself cannot be listed.
pub fn audit_directory(
    dir: &Utf8Path,
    half_width: usize,
) -> Result<Vec<(Utf8PathBuf, Result<ConfidenceReport, FlareLocError>)>, FlareLocError> {
    let mut paths = Vec::new();
    for entry in dir.read_dir_utf8()? {
        let path = entry?.into_path();
        if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("fits")) {
            paths.push(path);
        }
    }
    paths.sort();

    log::info!("auditing {} map files in {dir}", paths.len());

    Ok(paths
        .into_par_iter()
        .map(|path| {
            let result = check_map_file(&path, half_width);
            if let Err(err) = &result {
                log::warn!("confidence check of {path} failed: {err}");
            }
            (path, result)
        })
        .collect())
}

#[cfg(test)]
mod confidence_test {
    use super::*;
    use crate::flareloc_errors::ErrorKind;
    use crate::imaging::fits::write_map;
    use crate::imaging::map::{Map, MapFrame, MapWcs};

    #[test]
    fn test_single_isolated_peak_passes() {
        let mut data = Array2::from_elem((100, 100), 1.0);
        data[[50, 50]] = 10.0;
        data[[52, 49]] = 9.5; // inside the box
        let report = check_image(&data, DEFAULT_HALF_WIDTH).unwrap();
        assert_eq!(report.verdict, Confidence::Pass);
        assert_eq!(report.peak, (50, 50));
        assert_eq!(report.remainder_max, 1.0);
    }

    #[test]
    fn test_two_equal_peaks_fail() {
        let mut data = Array2::zeros((100, 100));
        data[[20, 20]] = 10.0;
        data[[80, 80]] = 10.0;
        let report = check_image(&data, DEFAULT_HALF_WIDTH).unwrap();
        assert_eq!(report.verdict, Confidence::Fail);
        assert_eq!(report.verdict.to_string(), "fail");
    }

    #[test]
    fn test_box_is_clamped_at_edges() {
        let mut data = Array2::zeros((30, 30));
        data[[0, 29]] = 10.0;
        data[[19, 10]] = 9.5; // inside [0, 20) × [9, 30)
        data[[20, 29]] = 2.0; // just below the box
        let report = check_image(&data, 20).unwrap();
        assert_eq!(report.verdict, Confidence::Pass);
        assert_eq!(report.remainder_max, 2.0);
    }

    #[test]
    fn test_box_upper_bound_is_exclusive() {
        let mut data = Array2::zeros((50, 50));
        data[[25, 25]] = 10.0;
        data[[25, 27]] = 9.5;
        assert_eq!(check_image(&data, 2).unwrap().verdict, Confidence::Fail);
        data[[25, 23]] = 9.5;
        data[[25, 27]] = 0.0;
        assert_eq!(check_image(&data, 2).unwrap().verdict, Confidence::Pass);
    }

    #[test]
    fn test_directory_audit() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();

        let wcs = MapWcs::centered(64, (0.0, 0.0), 10.0, 0.0);
        let mut good = Array2::zeros((64, 64));
        good[[32, 32]] = 5.0;
        let mut bad = good.clone();
        bad[[2, 2]] = 5.0;
        write_map(&Map::new(good, wcs, MapFrame::Native), &root.join("a.fits")).unwrap();
        write_map(&Map::new(bad, wcs, MapFrame::Native), &root.join("b.fits")).unwrap();
        std::fs::write(root.join("c.fits"), b"not a fits file").unwrap();
        std::fs::write(root.join("notes.txt"), b"ignored").unwrap();

        // Non-ASCII keyword and an absurd image size in an otherwise valid header
        let mut header = String::new();
        for card in [
            "SIMPLE  =                    T",
            "BITPIX  =                  -64",
            "NAXIS   =                    2",
            "NAXIS1  =  4611686018427387904",
            "NAXIS2  =                    4",
            "COMMENTé = 1",
            "END",
        ] {
            header.push_str(&format!("{card:<80}"));
        }
        let mut bytes = header.into_bytes();
        bytes.resize(2880, b' ');
        std::fs::write(root.join("d.fits"), &bytes).unwrap();

        let results = audit_directory(root, DEFAULT_HALF_WIDTH).unwrap();
        assert_eq!(results.len(), 4);
        assert_eq!(results[0].0.file_name(), Some("a.fits"));
        assert_eq!(results[0].1.as_ref().unwrap().verdict, Confidence::Pass);
        assert_eq!(results[1].1.as_ref().unwrap().verdict, Confidence::Fail);
        assert!(results[2].1.is_err());
        assert_eq!(results[3].0.file_name(), Some("d.fits"));
        assert_eq!(results[3].1.as_ref().unwrap_err().kind(), ErrorKind::Io);
    }
}
