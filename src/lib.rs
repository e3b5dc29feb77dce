pub mod batch;
pub mod constants;
pub mod detector;
pub mod estimation_params;
pub mod flare_estimate;
pub mod flareloc;
pub mod flareloc_errors;
pub mod imaging;
pub mod observers;
pub mod positions;
pub mod quality;
pub mod ref_system;
pub mod subcollimator;
pub mod time;
pub mod visibility;
