use std::fmt;

use hifitime::{Duration, Epoch};

use crate::constants::Second;
use crate::flareloc_errors::FlareLocError;

/// Closed time interval `[start, end]` over which counts are aggregated.
///
/// The window is always ordered (`start <= end`); the constructors enforce it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeWindow {
    start: Epoch,
    end: Epoch,
}

impl TimeWindow {
    /// Build a window from its two bounds.
    ///
    /// Arguments
    /// ---------
    /// * `start`: first epoch of the window
    /// * `end`: last epoch of the window
    ///
    /// Return
    /// ------
    /// * the window, or [`FlareLocError::InvalidParameter`] if `end < start`
    pub fn new(start: Epoch, end: Epoch) -> Result<Self, FlareLocError> {
        if end < start {
            return Err(FlareLocError::InvalidParameter(format!(
                "time window end {end} precedes start {start}"
            )));
        }
        Ok(TimeWindow { start, end })
    }

    /// Symmetric window of `half_width` seconds around a peak time.
    ///
    /// Argument
    /// --------
    /// * `peak`: center of the window
    /// * `half_width`: half-width in seconds (its absolute value is used)
    ///
    /// Return
    /// ------
    /// * the window `[peak - half_width, peak + half_width]`
    pub fn around(peak: Epoch, half_width: Second) -> Self {
        let dt = Duration::from_seconds(half_width.abs());
        TimeWindow {
            start: peak - dt,
            end: peak + dt,
        }
    }

    pub fn start(&self) -> Epoch {
        self.start
    }

    pub fn end(&self) -> Epoch {
        self.end
    }

    /// Length of the window in seconds
    pub fn duration_seconds(&self) -> Second {
        (self.end - self.start).to_seconds()
    }

    /// Mid-point of the window
    pub fn center(&self) -> Epoch {
        self.start + (self.end - self.start) * 0.5
    }

    /// True if the epoch lies inside the closed window
    pub fn contains(&self, epoch: Epoch) -> bool {
        self.start <= epoch && epoch <= self.end
    }

    /// True if the whole interval `[start, end]` lies inside the window
    pub fn contains_interval(&self, start: Epoch, end: Epoch) -> bool {
        self.contains(start) && self.contains(end)
    }

    /// Smallest window covering both `self` and `other`
    pub fn union(&self, other: &TimeWindow) -> TimeWindow {
        TimeWindow {
            start: if other.start < self.start {
                other.start
            } else {
                self.start
            },
            end: if other.end > self.end {
                other.end
            } else {
                self.end
            },
        }
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} .. {}]", self.start, self.end)
    }
}

/// Julian date (UTC) of an epoch
pub fn epoch_to_jd(epoch: Epoch) -> f64 {
    epoch.to_jde_utc_days()
}

#[cfg(test)]
mod time_test {
    use super::*;

    fn peak() -> Epoch {
        Epoch::from_gregorian_utc_hms(2022, 3, 30, 17, 30, 0)
    }

    #[test]
    fn test_window_around_peak() {
        let w = TimeWindow::around(peak(), 20.0);
        assert!((w.duration_seconds() - 40.0).abs() < 1e-9);
        assert_eq!(w.center(), peak());
        assert!(w.contains(peak()));
        assert!(!w.contains(peak() + Duration::from_seconds(20.5)));
    }

    #[test]
    fn test_window_rejects_reversed_bounds() {
        let err = TimeWindow::new(peak(), peak() - Duration::from_seconds(1.0)).unwrap_err();
        assert!(matches!(err, FlareLocError::InvalidParameter(_)));
    }

    #[test]
    fn test_window_union_and_interval() {
        let a = TimeWindow::around(peak(), 10.0);
        let b = TimeWindow::new(peak(), peak() + Duration::from_seconds(30.0)).unwrap();
        let u = a.union(&b);
        assert_eq!(u.start(), a.start());
        assert_eq!(u.end(), b.end());
        assert!(u.contains_interval(a.start(), b.end()));
        assert!(!a.contains_interval(a.start(), b.end()));
    }

    #[test]
    fn test_epoch_to_jd() {
        let j2000 = Epoch::from_gregorian_utc_hms(2000, 1, 1, 12, 0, 0);
        assert!((epoch_to_jd(j2000) - 2_451_545.0).abs() < 1e-6);
    }
}
