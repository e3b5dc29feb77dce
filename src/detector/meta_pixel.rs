//! # Meta-pixel extraction
//!
//! Reduce a [`RawCountData`] series to one aggregated value per [`Subfield`]
//! over a time and energy window. The resulting [`MetaPixelSet`] is the only input
//! of visibility synthesis.
//!
//! Aggregation policy
//! -----------------
//! * A sample contributes only if its **whole** accumulation interval lies inside the
//!   requested window and its channel lies inside the energy range. Nothing is
//!   extrapolated across the window boundaries.
//! * Net counts (`counts − background`), background and live time
//!   (`duration × live_fraction`) are summed per subfield.
//! * The **effective** window is the union of the contributing intervals; it is
//!   reported back because it may be shorter than the requested one.
//!
//! Errors
//! -----------------
//! * [`FlareLocError::DataGap`] if no sample satisfies both selections.
use std::collections::BTreeMap;

use crate::constants::Second;
use crate::detector::{EnergyRange, RawCountData, Subfield};
use crate::flareloc_errors::FlareLocError;
use crate::subcollimator::SubcollimatorId;
use crate::time::TimeWindow;

/// Aggregated counts of one subfield.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetaPixel {
    pub subfield: Subfield,
    pub energy: EnergyRange,
    pub window: TimeWindow,
    /// Background-subtracted counts
    pub net_counts: f64,
    pub background: f64,
    /// Detector live time, in seconds
    pub live_time: Second,
}

/// All meta pixels of one estimate, keyed by subfield.
#[derive(Debug, Clone)]
pub struct MetaPixelSet {
    pub pixels: BTreeMap<Subfield, MetaPixel>,
    pub requested: TimeWindow,
    pub effective: TimeWindow,
    pub energy: EnergyRange,
}

impl MetaPixelSet {
    pub fn get(&self, subfield: &Subfield) -> Option<&MetaPixel> {
        self.pixels.get(subfield)
    }

    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// Distinct subcollimators with at least one meta pixel, in ascending order.
    pub fn subcollimators(&self) -> Vec<SubcollimatorId> {
        let mut ids: Vec<SubcollimatorId> = self.pixels.keys().map(|s| s.isc).collect();
        ids.dedup();
        ids
    }
}

/// Aggregate raw samples into meta pixels.
///
/// Arguments
/// -----------------
/// * `data`: raw count series of the data product.
/// * `window`: requested time window.
/// * `energy`: requested energy range.
///
/// Return
/// ----------
/// * The [`MetaPixelSet`], with its effective window, or
///   [`FlareLocError::DataGap`] when the selection is empty.
pub fn extract_meta_pixels(
    data: &RawCountData,
    window: &TimeWindow,
    energy: &EnergyRange,
) -> Result<MetaPixelSet, FlareLocError> {
    let mut pixels: BTreeMap<Subfield, MetaPixel> = BTreeMap::new();
    let mut effective: Option<TimeWindow> = None;

    for sample in data
        .samples
        .iter()
        .filter(|s| window.contains_interval(s.start, s.end()))
        .filter(|s| energy.contains_channel(&s.channel))
    {
        let interval = TimeWindow::new(sample.start, sample.end())?;
        effective = Some(match effective {
            Some(w) => w.union(&interval),
            None => interval,
        });

        let live = sample.duration * sample.live_fraction.clamp(0.0, 1.0);
        pixels
            .entry(sample.subfield)
            .and_modify(|p| {
                p.net_counts += sample.counts - sample.background;
                p.background += sample.background;
                p.live_time += live;
                p.window = p.window.union(&interval);
            })
            .or_insert(MetaPixel {
                subfield: sample.subfield,
                energy: *energy,
                window: interval,
                net_counts: sample.counts - sample.background,
                background: sample.background,
                live_time: live,
            });
    }

    let effective = effective.ok_or_else(|| {
        FlareLocError::DataGap(format!("no samples in {window} within {energy}"))
    })?;

    log::debug!(
        "extracted {} meta pixels over {effective} ({energy})",
        pixels.len()
    );

    Ok(MetaPixelSet {
        pixels,
        requested: *window,
        effective,
        energy: *energy,
    })
}
