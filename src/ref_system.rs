//! # Solar coordinate frames
//!
//! Transforms between the frames a flare location is reported in:
//!
//! - **Native**: the imager's own sky frame (arcsec), tied to the helioprojective frame
//!   of the spacecraft by the roll angle and the pointing ([`native_to_hpc`]).
//! - **HPC** (helioprojective): observer-centered angles `(Tx, Ty)` in arcsec, `Tx`
//!   positive toward solar west, `Ty` toward solar north.
//! - **HCC** (heliocentric cartesian): Sun-centered, `z` toward the observer, km.
//! - **HGS** (heliographic Stonyhurst): Sun-centered, longitude 0 facing Earth.
//! - **HGC** (heliographic Carrington): HGS rotated with the Sun ([`carrington_l0`]).
//!
//! ## Off-disk points
//!
//! A helioprojective direction alone does not fix a 3-D point. On the disk the point is
//! taken on the solar surface (near intersection of the line of sight with the Sun);
//! off the disk it is placed on a **spherical screen** centered on the observer, with
//! radius the observer–Sun distance ([`OffDiskPolicy`]).
//!
//! ## Visibility
//!
//! [`is_visible`] decides if a 3-D point can be seen from an observer. A location that
//! is not visible has **NaN** helioprojective coordinates in that observer's frame: it is
//! data, not an error.
//!
//! ## See also
//! ------------
//! * [`crate::observers::ObserverPosition`] – HGS observer positions.
//! * [`crate::positions`] – multi-observer enrichment of a flare estimate.
use hifitime::Epoch;
use nalgebra::{Matrix2, Matrix3, Rotation3, Vector2, Vector3};

use crate::constants::{
    ArcSec, Degree, Kilometer, ARCSEC_PER_RADIAN, CARRINGTON_EPOCH_JD, CARRINGTON_SYNODIC_PERIOD,
    RADEG, RADSEC, R_SUN,
};
use crate::observers::{InstrumentAttitude, ObserverPosition};
use crate::time::epoch_to_jd;

/// Cartesian axis of an elementary rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

/// Elementary rotation matrix of angle `alpha` (radians) around `axis`.
///
/// The rotation is applied to the vector in a fixed frame: `rotmt(a, Z) · x̂`
/// turns `x̂` toward `ŷ` for `a > 0`.
pub fn rotmt(alpha: f64, axis: Axis) -> Matrix3<f64> {
    let axis = match axis {
        Axis::X => Vector3::x_axis(),
        Axis::Y => Vector3::y_axis(),
        Axis::Z => Vector3::z_axis(),
    };
    Rotation3::from_axis_angle(&axis, alpha).into()
}

/// Counter-clockwise 2-D rotation of `angle` degrees.
pub fn rot2(angle: Degree) -> Matrix2<f64> {
    let (s, c) = (angle * RADEG).sin_cos();
    Matrix2::new(c, -s, s, c)
}

/// What to do with a helioprojective direction that misses the solar disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OffDiskPolicy {
    /// Place the point at the observer–Sun distance along the line of sight
    #[default]
    SphericalScreen,
    /// Leave it undefined (NaN)
    Undefined,
}

/// HGS spherical → cartesian (km).
pub fn hgs_to_cartesian(lon: Degree, lat: Degree, radius: Kilometer) -> Vector3<f64> {
    let (lon, lat) = (lon * RADEG, lat * RADEG);
    Vector3::new(
        radius * lat.cos() * lon.cos(),
        radius * lat.cos() * lon.sin(),
        radius * lat.sin(),
    )
}

/// HGS cartesian → `(lon, lat, radius)`, longitude in `(-180°, 180°]`.
pub fn cartesian_to_hgs(point: &Vector3<f64>) -> (Degree, Degree, Kilometer) {
    let radius = point.norm();
    (
        point.y.atan2(point.x) / RADEG,
        (point.z / radius).asin() / RADEG,
        radius,
    )
}

/// Rotation HGS → HCC for an observer.
///
/// The rows are the HCC axes expressed in HGS: `x` toward solar west, `y` toward the
/// projected solar north, `z` toward the observer.
pub fn hgs_to_hcc_matrix(observer: &ObserverPosition) -> Matrix3<f64> {
    // Rz(−L) then Ry(B) bring the observer onto +x; the permutation reorders the
    // aligned axes (observer, west, north) into HCC order (west, north, observer).
    let align = rotmt(observer.lat * RADEG, Axis::Y) * rotmt(-observer.lon * RADEG, Axis::Z);
    let permute = Matrix3::new(0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0);
    permute * align
}

/// Helioprojective angles of an HCC point seen from `distance` km along `+z`.
pub fn hcc_to_hpc(hcc: &Vector3<f64>, distance: Kilometer) -> (ArcSec, ArcSec) {
    let along = distance - hcc.z;
    (
        hcc.x.atan2(along) * ARCSEC_PER_RADIAN,
        hcc.y.atan2(along.hypot(hcc.x)) * ARCSEC_PER_RADIAN,
    )
}

/// 3-D HGS point behind a helioprojective direction.
///
/// Arguments
/// -----------------
/// * `hpc`: `(Tx, Ty)` in arcsec, seen from `observer`.
/// * `observer`: HGS observer position.
/// * `policy`: handling of directions missing the solar disk.
///
/// Return
/// ----------
/// * The HGS cartesian point (km). Off-disk points follow `policy`; NaN directions
///   give a NaN point.
pub fn hpc_to_hgs_point(
    hpc: (ArcSec, ArcSec),
    observer: &ObserverPosition,
    policy: OffDiskPolicy,
) -> Vector3<f64> {
    let (tx, ty) = (hpc.0 * RADSEC, hpc.1 * RADSEC);
    let d_obs = observer.distance;
    let direction = Vector3::new(ty.cos() * tx.sin(), ty.sin(), -ty.cos() * tx.cos());

    let along = d_obs * ty.cos() * tx.cos();
    let discriminant = along * along - d_obs * d_obs + R_SUN * R_SUN;
    let range = if discriminant >= 0.0 {
        along - discriminant.sqrt()
    } else {
        match policy {
            OffDiskPolicy::SphericalScreen => d_obs,
            OffDiskPolicy::Undefined => f64::NAN,
        }
    };

    let hcc = Vector3::new(0.0, 0.0, d_obs) + direction * range;
    hgs_to_hcc_matrix(observer).transpose() * hcc
}

/// Can `point` (HGS cartesian, km) be seen from `observer`?
///
/// The point is visible if any of the following holds:
/// 1. it lies on the observer-facing hemisphere (`P·O ≥ 0`),
/// 2. it appears beyond the solar limb from the observer,
/// 3. its outward radial direction faces the observer (`P·(O − P) ≥ 0`).
///
/// Grazing cases count as visible. Any NaN component makes the point not visible.
pub fn is_visible(point: &Vector3<f64>, observer: &ObserverPosition) -> bool {
    let obs = observer.hgs_cartesian();

    let facing_hemisphere = point.dot(&obs) >= 0.0;

    let line_of_sight = point - obs;
    let cos_from_center = line_of_sight.dot(&(-obs)) / (line_of_sight.norm() * obs.norm());
    let beyond_limb = (1.0 - cos_from_center * cos_from_center).sqrt() > R_SUN / obs.norm();

    let normal_facing = point.dot(&(obs - point)) >= 0.0;

    facing_hemisphere || beyond_limb || normal_facing
}

/// Helioprojective angles of an HGS point seen from `observer`, NaN if not visible.
pub fn hgs_point_to_hpc(point: &Vector3<f64>, observer: &ObserverPosition) -> (ArcSec, ArcSec) {
    if !is_visible(point, observer) {
        return (f64::NAN, f64::NAN);
    }
    let hcc = hgs_to_hcc_matrix(observer) * point;
    hcc_to_hpc(&hcc, observer.distance)
}

/// Re-express a helioprojective coordinate seen from `from` in the frame of `to`.
///
/// The 3-D point is rebuilt with the spherical-screen convention for off-disk
/// directions; the result is NaN if the point is hidden from `to`.
pub fn reproject_hpc(
    hpc: (ArcSec, ArcSec),
    from: &ObserverPosition,
    to: &ObserverPosition,
) -> (ArcSec, ArcSec) {
    let point = hpc_to_hgs_point(hpc, from, OffDiskPolicy::SphericalScreen);
    hgs_point_to_hpc(&point, to)
}

/// Carrington longitude of the central meridian seen from Earth, in `[0°, 360°)`.
///
/// Uses the mean synodic rotation period from the start of Carrington rotation 1.
pub fn carrington_l0(epoch: Epoch) -> Degree {
    let rotations = (epoch_to_jd(epoch) - CARRINGTON_EPOCH_JD) / CARRINGTON_SYNODIC_PERIOD;
    (360.0 * (1.0 - rotations.fract())).rem_euclid(360.0)
}

/// HGS longitude → HGC longitude at `epoch`, in `[0°, 360°)`.
pub fn hgs_to_hgc_lon(lon: Degree, epoch: Epoch) -> Degree {
    (lon + carrington_l0(epoch)).rem_euclid(360.0)
}

/// Imager native frame → helioprojective frame of the spacecraft.
///
/// ```text
/// hpc = R(roll + roll_offset) · native + pointing
/// ```
pub fn native_to_hpc(
    native: (ArcSec, ArcSec),
    attitude: &InstrumentAttitude,
    roll_offset: Degree,
) -> (ArcSec, ArcSec) {
    let rotated = rot2(attitude.roll + roll_offset) * Vector2::new(native.0, native.1);
    (
        rotated.x + attitude.pointing.0,
        rotated.y + attitude.pointing.1,
    )
}

/// Inverse of [`native_to_hpc`].
pub fn hpc_to_native(
    hpc: (ArcSec, ArcSec),
    attitude: &InstrumentAttitude,
    roll_offset: Degree,
) -> (ArcSec, ArcSec) {
    let shifted = Vector2::new(hpc.0 - attitude.pointing.0, hpc.1 - attitude.pointing.1);
    let native = rot2(-(attitude.roll + roll_offset)) * shifted;
    (native.x, native.y)
}

/// Sun center expressed in the native frame.
pub fn disk_center_native(attitude: &InstrumentAttitude, roll_offset: Degree) -> (ArcSec, ArcSec) {
    hpc_to_native((0.0, 0.0), attitude, roll_offset)
}

/// Great-circle separation (arcsec) between two `(longitude, latitude)`-like sky
/// coordinates given in arcsec, e.g. two helioprojective positions.
pub fn angular_separation(a: (ArcSec, ArcSec), b: (ArcSec, ArcSec)) -> ArcSec {
    let (lon1, lat1) = (a.0 * RADSEC, a.1 * RADSEC);
    let (lon2, lat2) = (b.0 * RADSEC, b.1 * RADSEC);
    let h = ((lat2 - lat1) / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * ((lon2 - lon1) / 2.0).sin().powi(2);
    2.0 * h.sqrt().min(1.0).asin() * ARCSEC_PER_RADIAN
}

#[cfg(test)]
mod ref_system_test {
    use super::*;
    use crate::constants::AU;
    use crate::observers::ObserverName;
    use approx::assert_relative_eq;

    fn earth() -> ObserverPosition {
        ObserverPosition::earth_nominal()
    }

    #[test]
    fn test_rotmt_orientation() {
        let r = rotmt(std::f64::consts::FRAC_PI_2, Axis::Z);
        let y = r * Vector3::x();
        assert_relative_eq!(y, Vector3::y(), epsilon = 1e-15);
    }

    #[test]
    fn test_hcc_axes_for_nominal_observer() {
        let m = hgs_to_hcc_matrix(&earth());
        // HGS x (toward observer) is HCC z, HGS y is west, HGS z is north
        assert_relative_eq!(m * Vector3::x(), Vector3::z(), epsilon = 1e-15);
        assert_relative_eq!(m * Vector3::y(), Vector3::x(), epsilon = 1e-15);
        assert_relative_eq!(m * Vector3::z(), Vector3::y(), epsilon = 1e-15);
    }

    #[test]
    fn test_disk_center_and_limb() {
        let obs = earth();
        let center = hgs_point_to_hpc(&hgs_to_cartesian(0.0, 0.0, R_SUN), &obs);
        assert_relative_eq!(center.0, 0.0, epsilon = 1e-9);
        assert_relative_eq!(center.1, 0.0, epsilon = 1e-9);

        // A point on the west limb is seen close to the apparent radius.
        let west = hgs_point_to_hpc(&hgs_to_cartesian(89.0, 0.0, R_SUN), &obs);
        assert!(west.0 > 0.9 * obs.rsun_obs() && west.0 < obs.rsun_obs() * 1.01);
    }

    #[test]
    fn test_hpc_round_trip_on_disk() {
        let obs = ObserverPosition::new(ObserverName::SolarOrbiter, 35.0, -4.0, 0.4 * AU);
        let hpc = (-850.0, 1200.0);
        let point = hpc_to_hgs_point(hpc, &obs, OffDiskPolicy::SphericalScreen);
        assert_relative_eq!(point.norm(), R_SUN, max_relative = 1e-9);
        let back = hgs_point_to_hpc(&point, &obs);
        assert_relative_eq!(back.0, hpc.0, epsilon = 1e-6);
        assert_relative_eq!(back.1, hpc.1, epsilon = 1e-6);
    }

    #[test]
    fn test_off_disk_screen_and_undefined() {
        let obs = earth();
        let hpc = (0.0, 1500.0);
        let screen = hpc_to_hgs_point(hpc, &obs, OffDiskPolicy::SphericalScreen);
        assert!(screen.iter().all(|c| c.is_finite()));
        let back = hgs_point_to_hpc(&screen, &obs);
        assert_relative_eq!(back.1, 1500.0, epsilon = 1e-6);

        let undefined = hpc_to_hgs_point(hpc, &obs, OffDiskPolicy::Undefined);
        assert!(undefined.iter().all(|c| c.is_nan()));
    }

    #[test]
    fn test_far_side_point_is_nan() {
        let far = hgs_to_cartesian(170.0, 10.0, R_SUN);
        assert!(!is_visible(&far, &earth()));
        let (tx, ty) = hgs_point_to_hpc(&far, &earth());
        assert!(tx.is_nan() && ty.is_nan());
        assert!((tx + 1.0).is_nan());
    }

    #[test]
    fn test_nan_point_not_visible() {
        let nan = Vector3::new(f64::NAN, 0.0, 0.0);
        assert!(!is_visible(&nan, &earth()));
    }

    #[test]
    fn test_carrington_l0() {
        // Start of Carrington rotation 1: L0 = 0 (mod 360)
        let jd = Epoch::from_jde_utc(CARRINGTON_EPOCH_JD + 0.25 * CARRINGTON_SYNODIC_PERIOD);
        assert_relative_eq!(carrington_l0(jd), 270.0, epsilon = 1e-4);
        let lon = hgs_to_hgc_lon(100.0, jd);
        assert_relative_eq!(lon, 10.0, epsilon = 1e-4);
    }

    #[test]
    fn test_native_hpc_round_trip() {
        let attitude = InstrumentAttitude {
            roll: 3.2,
            pointing: (25.0, -60.0),
        };
        let native = (-512.3, 77.7);
        let hpc = native_to_hpc(native, &attitude, 90.0);
        let back = hpc_to_native(hpc, &attitude, 90.0);
        assert_relative_eq!(back.0, native.0, epsilon = 1e-9);
        assert_relative_eq!(back.1, native.1, epsilon = 1e-9);

        let center = disk_center_native(&attitude, 90.0);
        let hpc_center = native_to_hpc(center, &attitude, 90.0);
        assert_relative_eq!(hpc_center.0, 0.0, epsilon = 1e-9);
        assert_relative_eq!(hpc_center.1, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_angular_separation() {
        assert_relative_eq!(angular_separation((0.0, 0.0), (300.0, 400.0)), 500.0, max_relative = 1e-5);
        assert_eq!(angular_separation((12.0, -5.0), (12.0, -5.0)), 0.0);
    }
}
