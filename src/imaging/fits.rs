//! # FITS persistence of maps
//!
//! A [`Map`] is stored as one `f64` image HDU named `FLAREMAP`:
//!
//! - `NAXIS1` = columns, `NAXIS2` = rows. FITS counts rows from the bottom and the map
//!   row index grows with `y`, so array rows are written in order without a flip.
//! - linear WCS keywords `CRPIX1/2` (1-based), `CRVAL1/2`, `CDELT1/2`, `CROTA2`,
//! - the frame in `MAPFRAME` (`NATIVE` or `HPC`) and, when known, the observer
//!   (`OBSRVR`, `HGLN_OBS`, `HGLT_OBS`, `DSUN_OBS` in meters) and the observation time
//!   (`DATE-OBS`, `MJD-OBS`).
//!
//! Any file that does not hold such an HDU is reported as
//! [`FlareLocError::MapFormat`] (or [`FlareLocError::FitsIo`] when the FITS layer
//! itself rejects it), never as a panic.
use camino::Utf8Path;
use fitsio::compat::fitsfile::FitsFile;
use fitsio::compat::hdu::FitsHdu;
use fitsio::compat::images::{ImageDescription, ImageType, ReadImage, WriteImage};
use hifitime::Epoch;
use nalgebra::Vector2;
use ndarray::Array2;

use crate::flareloc_errors::FlareLocError;
use crate::imaging::map::{Map, MapFrame, MapWcs};
use crate::observers::{ObserverName, ObserverPosition};

/// `EXTNAME` of the image HDU holding the map.
pub const MAP_EXTNAME: &str = "FLAREMAP";

/// Write a map to a FITS file, replacing any existing file.
///
/// Arguments
/// -----------------
/// * `map`: map to persist.
/// * `path`: destination file.
///
/// Errors
/// ----------
/// * [`FlareLocError::FitsIo`] if the file cannot be created or written.
pub fn write_map(map: &Map, path: &Utf8Path) -> Result<(), FlareLocError> {
    let (rows, cols) = map.dim();
    let description = ImageDescription {
        data_type: ImageType::Double,
        dimensions: vec![cols, rows],
    };

    let mut fptr = FitsFile::create(path).overwrite().open()?;
    let hdu = fptr.create_image(MAP_EXTNAME, &description)?;

    let values: Vec<f64> = map.data.iter().copied().collect();
    f64::write_image(&mut fptr, &hdu, &values)?;

    hdu.write_key(&mut fptr, "EXTNAME", &MAP_EXTNAME.to_string())?;
    write_wcs(&mut fptr, &hdu, map)?;
    Ok(())
}

fn write_wcs(fptr: &mut FitsFile, hdu: &FitsHdu, map: &Map) -> Result<(), FlareLocError> {
    let (frame, ctype1, ctype2) = match &map.frame {
        MapFrame::Native => ("NATIVE", "SOLX", "SOLY"),
        MapFrame::Helioprojective(_) => ("HPC", "HPLN-TAN", "HPLT-TAN"),
    };
    hdu.write_key(fptr, "MAPFRAME", &frame.to_string())?;
    if let MapFrame::Helioprojective(name) = &map.frame {
        hdu.write_key(fptr, "FRAMEOBS", &name.to_string())?;
    }
    hdu.write_key(fptr, "CTYPE1", &ctype1.to_string())?;
    hdu.write_key(fptr, "CTYPE2", &ctype2.to_string())?;
    hdu.write_key(fptr, "CUNIT1", &"arcsec".to_string())?;
    hdu.write_key(fptr, "CUNIT2", &"arcsec".to_string())?;

    let wcs = &map.wcs;
    for (key, value) in [
        ("CRPIX1", wcs.crpix.x + 1.0),
        ("CRPIX2", wcs.crpix.y + 1.0),
        ("CRVAL1", wcs.crval.x),
        ("CRVAL2", wcs.crval.y),
        ("CDELT1", wcs.cdelt.x),
        ("CDELT2", wcs.cdelt.y),
        ("CROTA2", wcs.rotation),
    ] {
        hdu.write_key(fptr, key, &value)?;
    }

    if let Some(observer) = &map.observer {
        hdu.write_key(fptr, "OBSRVR", &observer.name.to_string())?;
        hdu.write_key(fptr, "HGLN_OBS", &observer.lon)?;
        hdu.write_key(fptr, "HGLT_OBS", &observer.lat)?;
        hdu.write_key(fptr, "DSUN_OBS", &(observer.distance * 1000.0))?;
    }
    if let Some(date) = map.date_obs {
        hdu.write_key(fptr, "DATE-OBS", &date.to_string())?;
        hdu.write_key(fptr, "MJD-OBS", &date.to_mjd_utc_days())?;
    }
    Ok(())
}

/// First HDU named [`MAP_EXTNAME`].
fn find_map_hdu(fptr: &FitsFile) -> Result<FitsHdu, FlareLocError> {
    let mut idx = 0usize;
    while let Ok(hdu) = fptr.hdu(idx) {
        if hdu.read_key::<String>(fptr, "EXTNAME").is_ok_and(|name| name.trim() == MAP_EXTNAME) {
            return Ok(hdu);
        }
        idx += 1;
    }
    Err(FlareLocError::MapFormat(format!("no {MAP_EXTNAME} image HDU")))
}

fn float_key(fptr: &FitsFile, hdu: &FitsHdu, key: &str) -> Result<f64, FlareLocError> {
    hdu.read_key::<f64>(fptr, key)
        .map_err(|e| FlareLocError::MapFormat(format!("keyword {key}: {e}")))
}

fn text_key(fptr: &FitsFile, hdu: &FitsHdu, key: &str) -> Option<String> {
    hdu.read_key::<String>(fptr, key)
        .ok()
        .map(|s| s.trim().to_string())
}

fn axis_len(fptr: &FitsFile, hdu: &FitsHdu, key: &str) -> Result<usize, FlareLocError> {
    let n = hdu
        .read_key::<i64>(fptr, key)
        .map_err(|e| FlareLocError::MapFormat(format!("keyword {key}: {e}")))?;
    usize::try_from(n).map_err(|_| FlareLocError::MapFormat(format!("{key} = {n} is negative")))
}

fn parse_observer_name(name: &str) -> ObserverName {
    name.parse()
        .unwrap_or_else(|_| ObserverName::Named(name.to_string()))
}

/// Read a map written by [`write_map`].
///
/// Errors
/// ----------
/// * [`FlareLocError::FitsIo`] if the file is not readable as FITS.
/// * [`FlareLocError::MapFormat`] if the map HDU, its shape or its WCS keywords are
///   missing or inconsistent.
pub fn read_map(path: &Utf8Path) -> Result<Map, FlareLocError> {
    let fptr = FitsFile::open(path)?;
    let hdu = find_map_hdu(&fptr)?;

    let naxis = hdu
        .read_key::<i64>(&fptr, "NAXIS")
        .map_err(|e| FlareLocError::MapFormat(format!("keyword NAXIS: {e}")))?;
    if naxis != 2 {
        return Err(FlareLocError::MapFormat(format!(
            "map must be two-dimensional, NAXIS = {naxis}"
        )));
    }
    let cols = axis_len(&fptr, &hdu, "NAXIS1")?;
    let rows = axis_len(&fptr, &hdu, "NAXIS2")?;
    let expected = rows.checked_mul(cols).ok_or_else(|| {
        FlareLocError::MapFormat(format!("image shape {rows} x {cols} overflows"))
    })?;

    let values = f64::read_image(&fptr, &hdu)?;
    if values.len() != expected {
        return Err(FlareLocError::MapFormat(format!(
            "image holds {} pixels, header declares {rows} x {cols}",
            values.len()
        )));
    }
    let data = Array2::from_shape_vec((rows, cols), values)
        .map_err(|e| FlareLocError::MapFormat(e.to_string()))?;

    let wcs = MapWcs {
        crpix: Vector2::new(
            float_key(&fptr, &hdu, "CRPIX1")? - 1.0,
            float_key(&fptr, &hdu, "CRPIX2")? - 1.0,
        ),
        crval: Vector2::new(
            float_key(&fptr, &hdu, "CRVAL1")?,
            float_key(&fptr, &hdu, "CRVAL2")?,
        ),
        cdelt: Vector2::new(
            float_key(&fptr, &hdu, "CDELT1")?,
            float_key(&fptr, &hdu, "CDELT2")?,
        ),
        rotation: float_key(&fptr, &hdu, "CROTA2").unwrap_or(0.0),
    };

    let observer = match text_key(&fptr, &hdu, "OBSRVR") {
        Some(name) => Some(ObserverPosition::new(
            parse_observer_name(&name),
            float_key(&fptr, &hdu, "HGLN_OBS")?,
            float_key(&fptr, &hdu, "HGLT_OBS")?,
            float_key(&fptr, &hdu, "DSUN_OBS")? / 1000.0,
        )),
        None => None,
    };

    let frame = match text_key(&fptr, &hdu, "MAPFRAME").as_deref() {
        Some("HPC") => {
            let name = text_key(&fptr, &hdu, "FRAMEOBS")
                .map(|s| parse_observer_name(&s))
                .or_else(|| observer.as_ref().map(|o| o.name.clone()))
                .ok_or_else(|| {
                    FlareLocError::MapFormat("helioprojective map without observer".into())
                })?;
            MapFrame::Helioprojective(name)
        }
        _ => MapFrame::Native,
    };

    let date_obs = float_key(&fptr, &hdu, "MJD-OBS")
        .ok()
        .map(Epoch::from_mjd_utc);

    Ok(Map {
        data,
        wcs,
        frame,
        observer,
        date_obs,
    })
}
