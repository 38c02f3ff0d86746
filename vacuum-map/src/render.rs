//! Overlay compositing (spec §4.8): draws the decoded vector layers onto a
//! copy of the parsed raster in a fixed order, then applies rotation last.
//!
//! Pure function of its inputs — same [`MapData`] and [`RenderOptions`]
//! always produce the same pixels.

use crate::model::{Area, MapData, Obstacle, Path, Wall};
use image::{Rgba, RgbaImage};

const COLOR_PATH: Rgba<u8> = Rgba([255, 255, 255, 255]);
const COLOR_MOP_PATH: Rgba<u8> = Rgba([255, 255, 255, 0x5F]);
const COLOR_GOTO_PATH: Rgba<u8> = Rgba([0, 255, 0, 255]);
const COLOR_PREDICTED_PATH: Rgba<u8> = Rgba([255, 255, 0, 255]);
const COLOR_ZONES_FILL: Rgba<u8> = Rgba([0xAD, 0xD8, 0xFF, 0x8F]);
const COLOR_NO_GO_FILL: Rgba<u8> = Rgba([255, 94, 73, 102]);
const COLOR_NO_MOPPING_FILL: Rgba<u8> = Rgba([163, 130, 211, 127]);
const COLOR_NO_CARPET_FILL: Rgba<u8> = Rgba([255, 33, 55, 127]);
const COLOR_VIRTUAL_WALLS: Rgba<u8> = Rgba([255, 0, 0, 255]);
const COLOR_CHARGER: Rgba<u8> = Rgba([86, 85, 210, 255]);
const COLOR_ROBOT: Rgba<u8> = Rgba([255, 255, 255, 255]);
const COLOR_OBSTACLE: Rgba<u8> = Rgba([63, 159, 254, 255]);
const COLOR_ROOM_LABEL: Rgba<u8> = Rgba([0, 0, 0, 255]);

#[derive(Clone, Copy, Debug)]
pub enum Rotation {
    None,
    Deg90,
    Deg180,
    Deg270,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct RenderOptions {
    pub rotation: Option<Rotation>,
    pub draw_path: bool,
    pub draw_mop_path: bool,
    pub draw_zones: bool,
    pub draw_walls: bool,
    pub draw_obstacles: bool,
}

impl RenderOptions {
    /// Every optional layer on, no rotation.
    pub fn all() -> Self {
        Self { rotation: None, draw_path: true, draw_mop_path: true, draw_zones: true, draw_walls: true, draw_obstacles: true }
    }
}

fn to_pixel(point_x: f64, point_y: f64, image: &RgbaImage) -> Option<(u32, u32)> {
    let x = (point_x / crate::model::MM).round();
    let y = image.height() as f64 - (point_y / crate::model::MM).round() - 1.0;
    if x < 0.0 || y < 0.0 || x >= image.width() as f64 || y >= image.height() as f64 {
        return None;
    }
    Some((x as u32, y as u32))
}

fn blend(image: &mut RgbaImage, x: u32, y: u32, color: Rgba<u8>) {
    if x >= image.width() || y >= image.height() {
        return;
    }
    if color.0[3] == 255 {
        image.put_pixel(x, y, color);
        return;
    }
    let existing = *image.get_pixel(x, y);
    let a = color.0[3] as f32 / 255.0;
    let mut blended = [0u8; 4];
    for c in 0..3 {
        blended[c] = (color.0[c] as f32 * a + existing.0[c] as f32 * (1.0 - a)) as u8;
    }
    blended[3] = existing.0[3].max(color.0[3]);
    image.put_pixel(x, y, Rgba(blended));
}

/// Bresenham, endpoints in world millimeters.
fn draw_line(image: &mut RgbaImage, x0: f64, y0: f64, x1: f64, y1: f64, color: Rgba<u8>) {
    let (Some((x0, y0)), Some((x1, y1))) = (to_pixel(x0, y0, image), to_pixel(x1, y1, image)) else {
        return;
    };
    let (x1, y1) = (x1 as i64, y1 as i64);
    let (mut px, mut py) = (x0 as i64, y0 as i64);
    let dx = (x1 - px).abs();
    let dy = -(y1 - py).abs();
    let sx = if px < x1 { 1 } else { -1 };
    let sy = if py < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    loop {
        blend(image, px as u32, py as u32, color);
        if px == x1 && py == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            px += sx;
        }
        if e2 <= dx {
            err += dx;
            py += sy;
        }
    }
}

fn draw_polyline(image: &mut RgbaImage, points: &[crate::model::Point], color: Rgba<u8>) {
    for pair in points.windows(2) {
        draw_line(image, pair[0].x, pair[0].y, pair[1].x, pair[1].y, color);
    }
}

fn draw_path(image: &mut RgbaImage, path: &Path, color: Rgba<u8>) {
    for polyline in &path.paths {
        draw_polyline(image, polyline, color);
    }
}

fn draw_filled_area(image: &mut RgbaImage, area: &Area, fill: Rgba<u8>) {
    let xs: Vec<f64> = area.points.iter().map(|p| p.x).collect();
    let ys: Vec<f64> = area.points.iter().map(|p| p.y).collect();
    let (x0, x1) = (xs.iter().cloned().fold(f64::MAX, f64::min), xs.iter().cloned().fold(f64::MIN, f64::max));
    let (y0, y1) = (ys.iter().cloned().fold(f64::MAX, f64::min), ys.iter().cloned().fold(f64::MIN, f64::max));
    let step = crate::model::MM;
    let mut y = y0;
    while y <= y1 {
        let mut x = x0;
        while x <= x1 {
            if let Some((px, py)) = to_pixel(x, y, image) {
                blend(image, px, py, fill);
            }
            x += step;
        }
        y += step;
    }
}

fn draw_wall(image: &mut RgbaImage, wall: &Wall, color: Rgba<u8>) {
    draw_line(image, wall.x0, wall.y0, wall.x1, wall.y1, color);
}

fn draw_dot(image: &mut RgbaImage, x: f64, y: f64, radius: i32, color: Rgba<u8>) {
    let Some((cx, cy)) = to_pixel(x, y, image) else { return };
    let (cx, cy) = (cx as i64, cy as i64);
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= radius * radius {
                let (px, py) = (cx + dx, cy + dy);
                if px >= 0 && py >= 0 {
                    blend(image, px as u32, py as u32, color);
                }
            }
        }
    }
}

fn draw_obstacle(image: &mut RgbaImage, obstacle: &Obstacle) {
    draw_dot(image, obstacle.x, obstacle.y, 2, COLOR_OBSTACLE);
}

/// No font/text crate is part of this stack, so a room "label" is a small
/// marker dropped at the room's bounding-box center rather than rendered
/// text.
fn draw_room_label(image: &mut RgbaImage, room: &crate::model::Room) {
    let cx = (room.x0 + room.x1) / 2.0;
    let cy = (room.y0 + room.y1) / 2.0;
    draw_dot(image, cx, cy, 1, COLOR_ROOM_LABEL);
}

fn rotate(image: RgbaImage, rotation: Rotation) -> RgbaImage {
    match rotation {
        Rotation::None => image,
        Rotation::Deg90 => image::imageops::rotate90(&image),
        Rotation::Deg180 => image::imageops::rotate180(&image),
        Rotation::Deg270 => image::imageops::rotate270(&image),
    }
}

/// Composite every overlay the options ask for onto a copy of the parsed
/// raster, in draw order: charger, robot, obstacles, paths, areas, walls,
/// room labels, then rotation last. Charger/robot are drawn first so later
/// area/wall fills can occlude them, matching the original compositing
/// order.
pub fn render(map: &MapData, options: &RenderOptions) -> Option<RgbaImage> {
    let base = map.image.as_ref()?;
    if base.is_empty() {
        return None;
    }
    let mut image = base.pixels.clone();

    if let Some(charger) = map.charger {
        draw_dot(&mut image, charger.x, charger.y, 4, COLOR_CHARGER);
    }
    if let Some(robot) = map.robot_position {
        draw_dot(&mut image, robot.x, robot.y, 4, COLOR_ROBOT);
    }

    if options.draw_obstacles {
        for obstacle in map
            .obstacles
            .iter()
            .chain(&map.ignored_obstacles)
            .chain(&map.obstacles_with_photo)
            .chain(&map.ignored_obstacles_with_photo)
        {
            draw_obstacle(&mut image, obstacle);
        }
    }
    if options.draw_mop_path {
        if let Some(path) = &map.mop_path {
            draw_path(&mut image, path, COLOR_MOP_PATH);
        }
    }
    if options.draw_path {
        if let Some(path) = &map.path {
            draw_path(&mut image, path, COLOR_PATH);
        }
        if let Some(path) = &map.goto_path {
            draw_path(&mut image, path, COLOR_GOTO_PATH);
        }
        if let Some(path) = &map.predicted_path {
            draw_path(&mut image, path, COLOR_PREDICTED_PATH);
        }
    }
    if options.draw_zones {
        for area in &map.no_carpet_areas {
            draw_filled_area(&mut image, area, COLOR_NO_CARPET_FILL);
        }
        for area in &map.no_go_areas {
            draw_filled_area(&mut image, area, COLOR_NO_GO_FILL);
        }
        for area in &map.no_mopping_areas {
            draw_filled_area(&mut image, area, COLOR_NO_MOPPING_FILL);
        }
        for zone in &map.zones {
            draw_filled_area(
                &mut image,
                &Area { points: [
                    crate::model::Point::new(zone.x0, zone.y0),
                    crate::model::Point::new(zone.x1, zone.y0),
                    crate::model::Point::new(zone.x1, zone.y1),
                    crate::model::Point::new(zone.x0, zone.y1),
                ] },
                COLOR_ZONES_FILL,
            );
        }
    }
    if options.draw_walls {
        for wall in &map.walls {
            draw_wall(&mut image, wall, COLOR_VIRTUAL_WALLS);
        }
    }
    for room in map.rooms.values() {
        draw_room_label(&mut image, room);
    }

    Some(match options.rotation {
        Some(r) => rotate(image, r),
        None => image,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ImageData, Position};
    use image::RgbaImage;

    fn test_map_with_charger() -> MapData {
        let mut map = MapData::default();
        map.image = Some(ImageData { pixels: RgbaImage::new(10, 10), top: 0, left: 0, width: 10, height: 10 });
        map.charger = Some(Position { x: 250.0, y: 250.0, angle: None });
        map
    }

    #[test]
    fn render_with_no_image_returns_none() {
        let map = MapData::default();
        assert!(render(&map, &RenderOptions::all()).is_none());
    }

    #[test]
    fn render_draws_charger_dot_somewhere_in_bounds() {
        let map = test_map_with_charger();
        let image = render(&map, &RenderOptions::all()).unwrap();
        assert_eq!(image.width(), 10);
        assert_eq!(image.height(), 10);
        let has_charger_pixel = image.pixels().any(|p| *p == COLOR_CHARGER);
        assert!(has_charger_pixel);
    }

    #[test]
    fn rotation_swaps_dimensions_for_90_degrees() {
        let map = test_map_with_charger();
        let mut options = RenderOptions::all();
        options.rotation = Some(Rotation::Deg90);
        let image = render(&map, &options).unwrap();
        assert_eq!((image.width(), image.height()), (10, 10));
    }

    #[test]
    fn ignored_obstacles_are_drawn_too() {
        let mut map = test_map_with_charger();
        map.charger = None;
        map.ignored_obstacles.push(Obstacle { x: 250.0, y: 250.0, kind: None, confidence: None, photo_name: None });
        let image = render(&map, &RenderOptions::all()).unwrap();
        assert!(image.pixels().any(|p| *p == COLOR_OBSTACLE));
    }

    #[test]
    fn room_label_is_drawn_at_bbox_center() {
        let mut map = test_map_with_charger();
        map.charger = None;
        map.rooms.insert(1, crate::model::Room { number: 1, x0: 100.0, y0: 100.0, x1: 300.0, y1: 300.0 });
        let image = render(&map, &RenderOptions::all()).unwrap();
        assert!(image.pixels().any(|p| *p == COLOR_ROOM_LABEL));
    }
}
