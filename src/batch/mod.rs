//! # Batch localization
//!
//! Run the per-flare pipeline of [`FlareLoc`] over many flares in parallel.
//!
//! Flares are independent: each one reads the shared, immutable [`FlareLoc`] context
//! and produces its own `Result`. A failing flare never stops the batch; its error is
//! kept in the result map and counted in the [`BatchSummary`].
//!
//! ### Progress UI (feature: `progress`)
//! When compiled with the `progress` feature, the batch renders a live progress bar
//! (via `indicatif`) with the failure count, the flare rate and the time between
//! completed flares.
//!
//! ## Example
//!
//! ```rust,no_run
//! use flareloc::batch::{estimate_all_flares, BatchSummary};
//! # fn run(flareloc: &flareloc::flareloc::FlareLoc, requests: &[flareloc::flare_estimate::FlareRequest]) {
//! let results = estimate_all_flares(flareloc, requests);
//! let summary = BatchSummary::from_results(&results);
//! println!("{summary}");
//! # }
//! ```
#[cfg(feature = "progress")]
mod progress_bar;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use ahash::RandomState;
use itertools::Itertools;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::constants::FlareId;
use crate::flare_estimate::{FlareLocationEstimate, FlareRequest};
use crate::flareloc::FlareLoc;
use crate::flareloc_errors::{ErrorKind, FlareLocError};

#[cfg(feature = "progress")]
use progress_bar::BatchProgress;

/// Per-flare outcome of a batch.
///
/// * `Ok(estimate)` – the pipeline completed for this flare.
/// * `Err(FlareLocError)` – the pipeline stopped for this flare only.
pub type FlareBatchResult =
    HashMap<FlareId, Result<FlareLocationEstimate, FlareLocError>, RandomState>;

/// Localize every flare of `requests` in parallel.
///
/// Arguments
/// -----------------
/// * `flareloc`: shared pipeline context.
/// * `requests`: flares to localize. Identifiers should be unique; for a repeated
///   identifier only the last result is kept.
///
/// Return
/// ----------
/// * One result per distinct flare identifier.
///
/// See also
/// ------------
/// * [`estimate_all_flares_with_cancel`] – cooperative cancellation.
/// * [`BatchSummary::from_results`] – success/failure counts.
pub fn estimate_all_flares(flareloc: &FlareLoc, requests: &[FlareRequest]) -> FlareBatchResult {
    estimate_all_flares_with_cancel(flareloc, requests, || false)
}

/// Cooperative cancellation version of [`estimate_all_flares`].
///
/// `should_cancel` is polled before each flare; once it returns `true`, flares that
/// have not started are skipped and absent from the result map. Flares already
/// running complete normally.
pub fn estimate_all_flares_with_cancel<F>(
    flareloc: &FlareLoc,
    requests: &[FlareRequest],
    should_cancel: F,
) -> FlareBatchResult
where
    F: Fn() -> bool + Sync,
{
    log::info!(
        "localizing {} flares with {}",
        requests.len(),
        flareloc.params()
    );

    #[cfg(feature = "progress")]
    let progress = BatchProgress::new(requests.len());

    let cancelled = AtomicBool::new(false);

    let outcomes: Vec<_> = requests
        .par_iter()
        .filter_map(|request| {
            if cancelled.load(Ordering::Relaxed) || should_cancel() {
                cancelled.store(true, Ordering::Relaxed);
                return None;
            }

            let result = flareloc.estimate(request);
            if let Err(err) = &result {
                log::warn!("flare {} failed: {err}", request.id);
            }

            #[cfg(feature = "progress")]
            progress.inc(result.is_ok());

            Some((request.id.clone(), result))
        })
        .collect();

    #[cfg(feature = "progress")]
    progress.finish(if cancelled.load(Ordering::Relaxed) {
        "Interrupted"
    } else {
        "Done"
    });

    if cancelled.load(Ordering::Relaxed) {
        log::warn!(
            "batch interrupted after {} of {} flares",
            outcomes.len(),
            requests.len()
        );
    }

    let mut results: FlareBatchResult = HashMap::default();
    for (id, result) in outcomes {
        if results.insert(id.clone(), result).is_some() {
            log::warn!("duplicate flare id {id}: keeping the last result");
        }
    }

    log::info!("{}", BatchSummary::from_results(&results));
    results
}

/// Flatten batch results into one record per flare, sorted by identifier.
///
/// Failed flares become NaN-filled records (see [`FlareLocationEstimate::failed`]).
pub fn into_records(results: FlareBatchResult) -> Vec<FlareLocationEstimate> {
    results
        .into_iter()
        .map(|(id, result)| {
            result.unwrap_or_else(|err| FlareLocationEstimate::failed(id, err.kind()))
        })
        .sorted_by(|a, b| a.id.cmp(&b.id))
        .collect()
}

/// Success and failure counts of a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: BTreeMap<ErrorKind, usize>,
}

impl BatchSummary {
    pub fn from_results(results: &FlareBatchResult) -> Self {
        let mut summary = BatchSummary {
            total: results.len(),
            ..Default::default()
        };
        for result in results.values() {
            match result {
                Ok(_) => summary.succeeded += 1,
                Err(err) => *summary.failed.entry(err.kind()).or_default() += 1,
            }
        }
        summary
    }

    pub fn failed_total(&self) -> usize {
        self.failed.values().sum()
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} flares: {} succeeded, {} failed",
            self.total,
            self.succeeded,
            self.failed_total()
        )?;
        if !self.failed.is_empty() {
            let parts = self
                .failed
                .iter()
                .map(|(kind, n)| format!("{kind}: {n}"))
                .join(", ");
            write!(f, " ({parts})")?;
        }
        Ok(())
    }
}
