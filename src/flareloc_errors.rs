use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::subcollimator::SubcollimatorId;

#[derive(Error, Debug)]
pub enum FlareLocError {
    #[error("No count samples in the requested window: {0}")]
    DataGap(String),

    #[error("No calibration entry for subcollimator {0}")]
    CalibrationMissing(SubcollimatorId),

    #[error("Degenerate back-projection image: {0}")]
    DegenerateImage(String),

    #[error("Grid of subcollimator {isc} is opaque at the prior location (transmission {transmission:.3e})")]
    GridOpaque {
        isc: SubcollimatorId,
        transmission: f64,
    },

    #[error("Ephemeris unavailable: {0}")]
    EphemerisUnavailable(String),

    #[error("Invalid estimation parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid map file format: {0}")]
    MapFormat(String),

    #[error("Unable to perform file operation: {0}")]
    IoError(#[from] std::io::Error),

    #[error("FITS I/O error: {0}")]
    FitsIo(#[from] fitsio::compat::errors::Error),

    #[error("UTF-8 Path error: {0}")]
    Utf8PathError(String),
}

impl FlareLocError {
    /// Coarse classification of the error, used for batch summaries.
    pub fn kind(&self) -> ErrorKind {
        use FlareLocError::*;
        match self {
            DataGap(_) => ErrorKind::DataGap,
            CalibrationMissing(_) => ErrorKind::CalibrationMissing,
            DegenerateImage(_) => ErrorKind::DegenerateImage,
            GridOpaque { .. } => ErrorKind::GridOpaque,
            EphemerisUnavailable(_) => ErrorKind::Ephemeris,
            InvalidParameter(_) => ErrorKind::InvalidParameter,
            MapFormat(_) | IoError(_) | FitsIo(_) | Utf8PathError(_) => ErrorKind::Io,
        }
    }
}

impl PartialEq for FlareLocError {
    fn eq(&self, other: &Self) -> bool {
        use FlareLocError::*;
        match (self, other) {
            (DataGap(a), DataGap(b)) => a == b,
            (CalibrationMissing(a), CalibrationMissing(b)) => a == b,
            (DegenerateImage(a), DegenerateImage(b)) => a == b,
            (
                GridOpaque {
                    isc: a,
                    transmission: ta,
                },
                GridOpaque {
                    isc: b,
                    transmission: tb,
                },
            ) => a == b && ta == tb,
            (EphemerisUnavailable(a), EphemerisUnavailable(b)) => a == b,
            (InvalidParameter(a), InvalidParameter(b)) => a == b,
            (MapFormat(a), MapFormat(b)) => a == b,
            (Utf8PathError(a), Utf8PathError(b)) => a == b,

            // io::Error is not comparable: same variant means equal
            (IoError(_), IoError(_)) => true,
            (FitsIo(a), FitsIo(b)) => a.to_string() == b.to_string(),

            _ => false,
        }
    }
}

/// Error discriminant, without payload.
///
/// Used as the key of per-kind failure counts in
/// [`BatchSummary`](crate::batch::BatchSummary).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ErrorKind {
    DataGap,
    CalibrationMissing,
    DegenerateImage,
    GridOpaque,
    Ephemeris,
    InvalidParameter,
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::DataGap => "data gap",
            ErrorKind::CalibrationMissing => "calibration missing",
            ErrorKind::DegenerateImage => "degenerate image",
            ErrorKind::GridOpaque => "grid opaque",
            ErrorKind::Ephemeris => "ephemeris",
            ErrorKind::InvalidParameter => "invalid parameter",
            ErrorKind::Io => "i/o",
        };
        f.write_str(s)
    }
}
