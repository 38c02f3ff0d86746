//! Typed map entities. Decoded eagerly into concrete records — no dict
//! pass-through, no block survives past parsing as raw bytes except
//! [`MapData::blocks`], which is genuinely opaque in the source format.

use std::collections::HashMap;

/// World-to-pixel scale: one pixel covers this many millimeters.
pub const MM: f64 = 50.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// World millimeters to image pixels.
    pub fn to_image(self) -> Point {
        Point::new(self.x / MM, self.y / MM)
    }
}

/// A charger or robot position: a point plus an optional heading in degrees.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub angle: Option<i32>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Wall {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

pub type Zone = Wall;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Area {
    pub points: [Point; 4],
}

/// One or more polylines sharing the same declared point size/angle.
#[derive(Clone, Debug, PartialEq)]
pub struct Path {
    pub point_length: i32,
    pub point_size: i32,
    pub angle: i32,
    pub paths: Vec<Vec<Point>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObstacleKind {
    Cable,
    Shoes,
    Poop,
    ExtensionCord,
    WeighingScale,
    Clothes,
    Other(u16),
}

impl From<u16> for ObstacleKind {
    fn from(v: u16) -> Self {
        match v {
            0 => Self::Cable,
            2 => Self::Shoes,
            3 => Self::Poop,
            5 => Self::ExtensionCord,
            9 => Self::WeighingScale,
            10 => Self::Clothes,
            other => Self::Other(other),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Obstacle {
    pub x: f64,
    pub y: f64,
    pub kind: Option<ObstacleKind>,
    pub confidence: Option<f64>,
    pub photo_name: Option<String>,
}

/// A room's pixel-space bounding box, already translated into world
/// millimeters via [`Point::to_image`]'s inverse.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Room {
    pub number: u8,
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

/// Raster plus the geometry needed to place world coordinates on it.
#[derive(Clone, Debug)]
pub struct ImageData {
    pub pixels: image::RgbaImage,
    pub top: i32,
    pub left: i32,
    pub width: i32,
    pub height: i32,
}

impl ImageData {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// The fully decoded map.
#[derive(Clone, Debug, Default)]
pub struct MapData {
    pub is_valid: bool,
    pub major_version: u16,
    pub minor_version: u16,
    pub map_index: u32,
    pub map_sequence: u32,
    pub charger: Option<Position>,
    pub robot_position: Option<Position>,
    pub goto_target: Option<Point>,
    pub path: Option<Path>,
    pub goto_path: Option<Path>,
    pub predicted_path: Option<Path>,
    pub mop_path: Option<Path>,
    pub zones: Vec<Zone>,
    pub walls: Vec<Wall>,
    pub no_go_areas: Vec<Area>,
    pub no_mopping_areas: Vec<Area>,
    pub no_carpet_areas: Vec<Area>,
    pub obstacles: Vec<Obstacle>,
    pub ignored_obstacles: Vec<Obstacle>,
    pub obstacles_with_photo: Vec<Obstacle>,
    pub ignored_obstacles_with_photo: Vec<Obstacle>,
    pub carpet_map: std::collections::HashSet<usize>,
    pub blocks: Vec<u8>,
    pub rooms: HashMap<u8, Room>,
    pub vacuum_room: Option<u8>,
    pub image: Option<ImageData>,
}

impl Default for ImageData {
    fn default() -> Self {
        Self { pixels: image::RgbaImage::new(0, 0), top: 0, left: 0, width: 0, height: 0 }
    }
}
