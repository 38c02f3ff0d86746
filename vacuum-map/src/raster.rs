//! Pixel-grid decode of the IMAGE block body (spec §4.7).
//!
//! Each byte of `data` is one pixel, row-major, `width` pixels per row,
//! with a `MAP_OUTSIDE`/`MAP_WALL`/`MAP_INSIDE`/`MAP_SCAN` fast path and a
//! low-3-bit fallback (grey wall / wall v2 / room) for everything else.

use crate::error::MapError;
use crate::model::{ImageData, Room};
use image::{Rgba, RgbaImage};
use std::collections::{HashMap, HashSet};

pub const MAP_OUTSIDE: u8 = 0x00;
pub const MAP_WALL: u8 = 0x01;
pub const MAP_INSIDE: u8 = 0xFF;
pub const MAP_SCAN: u8 = 0x07;

/// Below this width or height (in pixels), a trim request is ignored
/// outright rather than collapsing the map to a sliver.
const MINIMAL_IMAGE_WIDTH: i32 = 100;
const MINIMAL_IMAGE_HEIGHT: i32 = 100;

const COLOR_OUTSIDE: Rgba<u8> = Rgba([0, 0, 0, 0]);
const COLOR_WALL: Rgba<u8> = Rgba([109, 110, 112, 255]);
const COLOR_INSIDE: Rgba<u8> = Rgba([32, 115, 185, 255]);
const COLOR_SCAN: Rgba<u8> = Rgba([158, 158, 158, 255]);
const COLOR_UNKNOWN: Rgba<u8> = Rgba([0, 0, 0, 0]);
const COLOR_CARPET: Rgba<u8> = Rgba([170, 56, 56, 255]);

/// Average one color channel toward another — the checkerboard carpet tint
/// is a 50/50 blend, not a flat overlay.
fn combine_color_component(a: u8, b: u8) -> u8 {
    ((a as u16 + b as u16) / 2) as u8
}

fn blend_carpet(color: Rgba<u8>) -> Rgba<u8> {
    Rgba([
        combine_color_component(color[0], COLOR_CARPET[0]),
        combine_color_component(color[1], COLOR_CARPET[1]),
        combine_color_component(color[2], COLOR_CARPET[2]),
        color[3],
    ])
}

fn room_color(room_number: u8) -> Rgba<u8> {
    const PALETTE: [[u8; 3]; 8] = [
        [171, 199, 248],
        [216, 188, 250],
        [238, 186, 202],
        [248, 220, 155],
        [186, 234, 182],
        [159, 223, 230],
        [250, 186, 161],
        [201, 201, 235],
    ];
    let [r, g, b] = PALETTE[(room_number as usize >> 1) % PALETTE.len()];
    Rgba([r, g, b, 255])
}

/// Percentage (0-100) trimmed off each edge before rendering.
#[derive(Clone, Copy, Debug, Default)]
pub struct Trim {
    pub left: i32,
    pub right: i32,
    pub top: i32,
    pub bottom: i32,
}

pub fn parse_image(
    header: &[u8],
    data: &[u8],
    carpet_map: &HashSet<usize>,
) -> Result<(ImageData, HashMap<u8, Room>), MapError> {
    parse_image_trimmed(header, data, Trim::default(), carpet_map)
}

pub fn parse_image_trimmed(
    header: &[u8],
    data: &[u8],
    mut trim: Trim,
    carpet_map: &HashSet<usize>,
) -> Result<(ImageData, HashMap<u8, Room>), MapError> {
    let header_len = header.len();
    let get_i32 = |at: usize| -> Result<i32, MapError> {
        header.get(at..at + 4).map(|b| i32::from_le_bytes(b.try_into().unwrap())).ok_or(MapError::Truncated)
    };
    let image_top = get_i32(header_len.checked_sub(16).ok_or(MapError::Truncated)?)?;
    let image_left = get_i32(header_len.checked_sub(12).ok_or(MapError::Truncated)?)?;
    let image_height = get_i32(header_len.checked_sub(8).ok_or(MapError::Truncated)?)?;
    let image_width = get_i32(header_len.checked_sub(4).ok_or(MapError::Truncated)?)?;

    if image_width == 0 || image_height == 0 {
        return Ok((ImageData::default(), HashMap::new()));
    }

    if image_width - image_width * (trim.left + trim.right) / 100 < MINIMAL_IMAGE_WIDTH {
        trim.left = 0;
        trim.right = 0;
    }
    if image_height - image_height * (trim.top + trim.bottom) / 100 < MINIMAL_IMAGE_HEIGHT {
        trim.top = 0;
        trim.bottom = 0;
    }

    let trim_left = trim.left * image_width / 100;
    let trim_right = trim.right * image_width / 100;
    let trim_top = trim.top * image_height / 100;
    let trim_bottom = trim.bottom * image_height / 100;
    let trimmed_width = image_width - trim_left - trim_right;
    let trimmed_height = image_height - trim_top - trim_bottom;
    if trimmed_width <= 0 || trimmed_height <= 0 {
        return Ok((ImageData::default(), HashMap::new()));
    }

    let mut pixels = RgbaImage::new(trimmed_width as u32, trimmed_height as u32);
    let mut rooms: HashMap<u8, Room> = HashMap::new();

    for img_y in 0..trimmed_height {
        for img_x in 0..trimmed_width {
            let idx = (img_x + trim_left + image_width * (img_y + trim_bottom)) as usize;
            let pixel_type = *data.get(idx).ok_or(MapError::Truncated)?;
            let x = img_x as u32;
            let y = (trimmed_height - img_y - 1) as u32;

            let mut color = match pixel_type {
                MAP_OUTSIDE => COLOR_OUTSIDE,
                MAP_WALL => COLOR_WALL,
                MAP_INSIDE => COLOR_INSIDE,
                MAP_SCAN => COLOR_SCAN,
                other => match other & 0x07 {
                    0 => COLOR_OUTSIDE,
                    1 => COLOR_WALL,
                    7 => {
                        let room_number = (other & 0xFF) >> 3;
                        let room_x = (img_x + trim_left) as f64;
                        let room_y = (img_y + trim_bottom) as f64;
                        rooms
                            .entry(room_number)
                            .and_modify(|r| {
                                r.x0 = r.x0.min(room_x);
                                r.y0 = r.y0.min(room_y);
                                r.x1 = r.x1.max(room_x);
                                r.y1 = r.y1.max(room_y);
                            })
                            .or_insert(Room { number: room_number, x0: room_x, y0: room_y, x1: room_x, y1: room_y });
                        room_color(room_number)
                    }
                    _ => COLOR_UNKNOWN,
                },
            };
            if carpet_map.contains(&idx) && (img_x + img_y) % 2 != 0 {
                color = blend_carpet(color);
            }
            pixels.put_pixel(x, y, color);
        }
    }

    for room in rooms.values_mut() {
        room.x0 = (room.x0 + image_left as f64) * crate::model::MM;
        room.x1 = (room.x1 + image_left as f64) * crate::model::MM;
        room.y0 = (room.y0 + image_top as f64) * crate::model::MM;
        room.y1 = (room.y1 + image_top as f64) * crate::model::MM;
    }

    let image_data = ImageData { pixels, top: image_top, left: image_left, width: trimmed_width, height: trimmed_height };
    Ok((image_data, rooms))
}

/// Mirror of the parse loop's fallback classification, applied to a single
/// raw (untrimmed) pixel — used to find which room a world point falls in.
pub fn room_at_pixel(raw_data: &[u8], width: usize, x: usize, y: usize) -> Option<u8> {
    let idx = x.checked_add(width.checked_mul(y)?)?;
    let pixel_type = *raw_data.get(idx)?;
    if pixel_type == MAP_INSIDE || pixel_type == MAP_SCAN {
        return None;
    }
    if pixel_type & 0x07 == 7 {
        Some((pixel_type & 0xFF) >> 3)
    } else {
        None
    }
}
