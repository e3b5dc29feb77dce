//! # Maps and world coordinates
//!
//! A [`Map`] is a 2-D intensity grid (`[row, col]`) tagged with a linear world
//! coordinate system ([`MapWcs`]) and a [`MapFrame`].
//!
//! ## Pixel convention
//!
//! Pixel positions are `(x, y) = (col, row)`, **0-based**, pixel centers at integer
//! positions. The world coordinate of a pixel position `p` is
//!
//! ```text
//! world = crval + R(rotation) · ((p − crpix) ⊙ cdelt)
//! ```
//!
//! and [`MapWcs::world_to_pixel`] is its exact algebraic inverse.
use std::fmt;

use hifitime::Epoch;
use nalgebra::Vector2;
use ndarray::Array2;

use crate::constants::{ArcSec, Degree};
use crate::observers::{ObserverName, ObserverPosition};
use crate::ref_system::rot2;

/// Sky frame of the world coordinates of a map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapFrame {
    /// Imager native frame
    Native,
    /// Helioprojective frame of the given observer
    Helioprojective(ObserverName),
}

impl fmt::Display for MapFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapFrame::Native => f.write_str("native"),
            MapFrame::Helioprojective(observer) => write!(f, "helioprojective ({observer})"),
        }
    }
}

/// Linear world coordinate system of a map.
///
/// Fields
/// -----------------
/// * `crpix` – reference pixel `(x, y)`, 0-based.
/// * `crval` – world coordinate of the reference pixel (arcsec).
/// * `cdelt` – pixel scale per axis (arcsec / pixel).
/// * `rotation` – counter-clockwise rotation of the pixel axes (degrees).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapWcs {
    pub crpix: Vector2<f64>,
    pub crval: Vector2<f64>,
    pub cdelt: Vector2<f64>,
    pub rotation: Degree,
}

impl MapWcs {
    /// WCS of a square `npix × npix` map centered on `center`.
    pub fn centered(npix: usize, center: (ArcSec, ArcSec), scale: ArcSec, rotation: Degree) -> Self {
        let mid = (npix as f64 - 1.0) / 2.0;
        MapWcs {
            crpix: Vector2::new(mid, mid),
            crval: Vector2::new(center.0, center.1),
            cdelt: Vector2::new(scale, scale),
            rotation,
        }
    }

    /// World coordinate of pixel position `(x, y)`.
    pub fn pixel_to_world(&self, pixel: (f64, f64)) -> (ArcSec, ArcSec) {
        let offset = (Vector2::new(pixel.0, pixel.1) - self.crpix).component_mul(&self.cdelt);
        let world = self.crval + rot2(self.rotation) * offset;
        (world.x, world.y)
    }

    /// Pixel position `(x, y)` of a world coordinate.
    pub fn world_to_pixel(&self, world: (ArcSec, ArcSec)) -> (f64, f64) {
        let offset = rot2(-self.rotation) * (Vector2::new(world.0, world.1) - self.crval);
        let pixel = offset.component_div(&self.cdelt) + self.crpix;
        (pixel.x, pixel.y)
    }
}

/// An image with its world coordinates and observation metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Map {
    pub data: Array2<f64>,
    pub wcs: MapWcs,
    pub frame: MapFrame,
    pub observer: Option<ObserverPosition>,
    pub date_obs: Option<Epoch>,
}

impl Map {
    pub fn new(data: Array2<f64>, wcs: MapWcs, frame: MapFrame) -> Self {
        Map {
            data,
            wcs,
            frame,
            observer: None,
            date_obs: None,
        }
    }

    pub fn with_observer(mut self, observer: ObserverPosition) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn with_date_obs(mut self, date_obs: Epoch) -> Self {
        self.date_obs = Some(date_obs);
        self
    }

    /// `(rows, cols)`
    pub fn dim(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// World coordinate of the pixel at `[row, col]`.
    pub fn index_to_world(&self, row: usize, col: usize) -> (ArcSec, ArcSec) {
        self.wcs.pixel_to_world((col as f64, row as f64))
    }

    /// Same image and metadata in another frame.
    pub fn reframed(&self, wcs: MapWcs, frame: MapFrame) -> Map {
        Map {
            data: self.data.clone(),
            wcs,
            frame,
            observer: self.observer.clone(),
            date_obs: self.date_obs,
        }
    }
}

impl fmt::Display for Map {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (rows, cols) = self.dim();
        write!(
            f,
            "{rows}×{cols} map, {} frame, center ({:.2}, {:.2})\", scale {:.3}\"/px, rotation {:.2}°",
            self.frame, self.wcs.crval.x, self.wcs.crval.y, self.wcs.cdelt.x, self.wcs.rotation
        )
    }
}
