use crate::subcollimator::ResolutionBand;
use crate::visibility::VisibilitySet;

/// Keep only the visibilities of subcollimators belonging to `band`.
///
/// Selection is by membership only, so the order of `band` does not matter and the
/// relative order of the kept visibilities is preserved. An empty result is returned
/// as is, with a warning: it back-projects to an all-zero image.
pub fn select_band(set: &VisibilitySet, band: &ResolutionBand) -> VisibilitySet {
    let visibilities = set
        .visibilities
        .iter()
        .filter(|vis| band.contains(vis.isc))
        .copied()
        .collect();

    let selected = VisibilitySet {
        visibilities,
        phase_center: set.phase_center,
        window: set.window,
        energy: set.energy,
    };

    if selected.is_empty() {
        log::warn!(
            "no visibility left after selecting resolution band {} ({} available)",
            band.name,
            set.len()
        );
    }
    selected
}
