//! Block-typed TLV stream decoder (spec §4.6).
//!
//! After a 20-byte top-level header, the blob is a sequence of
//! `block_header[header_len] | block_data[data_len]` records. The header is
//! self-describing: `header[0x00..0x02]` is the block type,
//! `header[0x02..0x04]` is the header's own length, `header[0x04..0x08]` is
//! the data length. The next block starts at
//! `current + header_len + data_len + header[2]` — that trailing
//! `+ header[2]` (the header-length byte read as a single `u8`, not the
//! `u16` used elsewhere) is a quirk of the wire format, not a bug; it is
//! preserved here rather than "fixed".

use crate::error::MapError;
use crate::raster::parse_image;
use crate::model::*;
use std::collections::HashSet;

const CHARGER: u16 = 1;
const IMAGE: u16 = 2;
const PATH: u16 = 3;
const GOTO_PATH: u16 = 4;
const GOTO_PREDICTED_PATH: u16 = 5;
const CURRENTLY_CLEANED_ZONES: u16 = 6;
const GOTO_TARGET: u16 = 7;
const ROBOT_POSITION: u16 = 8;
const NO_GO_AREAS: u16 = 9;
const VIRTUAL_WALLS: u16 = 10;
const BLOCKS: u16 = 11;
const NO_MOPPING_AREAS: u16 = 12;
const OBSTACLES: u16 = 13;
const IGNORED_OBSTACLES: u16 = 14;
const OBSTACLES_WITH_PHOTO: u16 = 15;
const IGNORED_OBSTACLES_WITH_PHOTO: u16 = 16;
const CARPET_MAP: u16 = 17;
const MOP_PATH: u16 = 18;
const NO_CARPET_AREAS: u16 = 19;
const DIGEST: u16 = 1024;

fn u16_le(data: &[u8], at: usize) -> Option<u16> {
    Some(u16::from_le_bytes(data.get(at..at + 2)?.try_into().ok()?))
}

fn u32_le(data: &[u8], at: usize) -> Option<u32> {
    Some(u32::from_le_bytes(data.get(at..at + 4)?.try_into().ok()?))
}

fn i32_le(data: &[u8], at: usize) -> Option<i32> {
    u32_le(data, at).map(|v| v as i32)
}

/// Parse a complete map blob.
pub fn parse(raw: &[u8]) -> Result<MapData, MapError> {
    let mut map = MapData::default();
    if raw.len() < 0x14 {
        return Err(MapError::Truncated);
    }

    let header_length = u16_le(raw, 0x02).ok_or(MapError::Truncated)? as usize;
    map.major_version = u16_le(raw, 0x08).ok_or(MapError::Truncated)?;
    map.minor_version = u16_le(raw, 0x0A).ok_or(MapError::Truncated)?;
    map.map_index = u32_le(raw, 0x0C).ok_or(MapError::Truncated)?;
    map.map_sequence = u32_le(raw, 0x10).ok_or(MapError::Truncated)?;

    let mut pos = header_length;
    let mut image_block: Option<(usize, usize, usize)> = None; // (block_start, header_len, data_len)

    while pos < raw.len() {
        let block_header_len = u16_le(raw, pos + 0x02).ok_or(MapError::Truncated)? as usize;
        let header = raw.get(pos..pos + block_header_len).ok_or(MapError::Truncated)?;
        let block_type = u16_le(header, 0x00).ok_or(MapError::Truncated)?;
        let data_len = u32_le(header, 0x04).ok_or(MapError::Truncated)? as usize;
        let data_start = pos + block_header_len;
        let data = raw.get(data_start..data_start + data_len).ok_or(MapError::Truncated)?;

        match block_type {
            CHARGER => map.charger = Some(parse_object_position(data)),
            ROBOT_POSITION => map.robot_position = Some(parse_object_position(data)),
            IMAGE => image_block = Some((pos, block_header_len, data_len)),
            PATH => map.path = Some(parse_path(raw, pos, header)?),
            GOTO_PATH => map.goto_path = Some(parse_path(raw, pos, header)?),
            GOTO_PREDICTED_PATH => map.predicted_path = Some(parse_path(raw, pos, header)?),
            CURRENTLY_CLEANED_ZONES => map.zones = parse_quads(data, header)?,
            GOTO_TARGET => map.goto_target = Some(parse_goto_target(data)?),
            DIGEST => map.is_valid = true,
            VIRTUAL_WALLS => map.walls = parse_quads(data, header)?,
            NO_GO_AREAS => map.no_go_areas = parse_areas(data, header)?,
            NO_MOPPING_AREAS => map.no_mopping_areas = parse_areas(data, header)?,
            NO_CARPET_AREAS => map.no_carpet_areas = parse_areas(data, header)?,
            OBSTACLES => map.obstacles = parse_obstacles(data, header)?,
            IGNORED_OBSTACLES => map.ignored_obstacles = parse_obstacles(data, header)?,
            OBSTACLES_WITH_PHOTO => map.obstacles_with_photo = parse_obstacles(data, header)?,
            IGNORED_OBSTACLES_WITH_PHOTO => map.ignored_obstacles_with_photo = parse_obstacles(data, header)?,
            BLOCKS => {
                let block_pairs = u16_le(header, 0x08).ok_or(MapError::Truncated)? as usize;
                map.blocks = data.get(..block_pairs).ok_or(MapError::Truncated)?.to_vec();
            }
            MOP_PATH => {
                if let Some(path) = &map.path {
                    map.mop_path = Some(parse_mop_path(path, data));
                }
            }
            CARPET_MAP => map.carpet_map = parse_carpet_map(data),
            other => log::debug!("unknown map block type {other}, header {block_header_len}B, data {data_len}B"),
        }

        // header[2] read as a single byte (u8), not the u16 used for header_len.
        let trailing_quirk = header[2] as usize;
        pos = data_start + data_len + trailing_quirk;
    }

    if let Some((block_start, header_len, data_len)) = image_block {
        let header = &raw[block_start..block_start + header_len];
        let data = &raw[block_start + header_len..block_start + header_len + data_len];
        let (image_data, rooms) = parse_image(header, data, &map.carpet_map)?;
        map.rooms = rooms;
        map.image = Some(image_data);

        if let (Some(image), true) = (map.image.as_ref(), !map.rooms.is_empty()) {
            if let Some(robot) = map.robot_position {
                map.vacuum_room = current_vacuum_room(header, data, image, robot);
            }
        }
    }

    Ok(map)
}

fn parse_object_position(data: &[u8]) -> Position {
    let x = i32_le(data, 0x00).unwrap_or(0) as f64;
    let y = i32_le(data, 0x04).unwrap_or(0) as f64;
    let angle = if data.len() > 8 { i32_le(data, 0x08) } else { None };
    Position { x, y, angle }
}

fn parse_goto_target(data: &[u8]) -> Result<Point, MapError> {
    let x = u16_le(data, 0x00).ok_or(MapError::Truncated)? as f64;
    let y = u16_le(data, 0x02).ok_or(MapError::Truncated)? as f64;
    Ok(Point::new(x, y))
}

fn parse_path(raw: &[u8], block_start: usize, header: &[u8]) -> Result<Path, MapError> {
    let end_pos = u32_le(header, 0x04).ok_or(MapError::Truncated)? as usize;
    let point_length = i32_le(header, 0x08).ok_or(MapError::Truncated)?;
    let point_size = i32_le(header, 0x0C).ok_or(MapError::Truncated)?;
    let angle = i32_le(header, 0x10).ok_or(MapError::Truncated)?;

    let start = block_start + 0x14;
    let mut points = Vec::with_capacity(end_pos / 4);
    let mut pos = start;
    while pos < start + end_pos {
        let x = u16_le(raw, pos).ok_or(MapError::Truncated)? as f64;
        let y = u16_le(raw, pos + 2).ok_or(MapError::Truncated)? as f64;
        points.push(Point::new(x, y));
        pos += 4;
    }
    Ok(Path { point_length, point_size, angle, paths: vec![points] })
}

/// Shared decoder for walls/zones: 8-byte `(x0,y0,x1,y1)` records.
fn parse_quads(data: &[u8], header: &[u8]) -> Result<Vec<Wall>, MapError> {
    let count = u16_le(header, 0x08).ok_or(MapError::Truncated)? as usize;
    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        let base = i * 8;
        let chunk = data.get(base..base + 8).ok_or(MapError::Truncated)?;
        out.push(Wall {
            x0: u16_le(chunk, 0).unwrap() as f64,
            y0: u16_le(chunk, 2).unwrap() as f64,
            x1: u16_le(chunk, 4).unwrap() as f64,
            y1: u16_le(chunk, 6).unwrap() as f64,
        });
    }
    Ok(out)
}

/// 16-byte four-corner-polygon records.
fn parse_areas(data: &[u8], header: &[u8]) -> Result<Vec<Area>, MapError> {
    let count = u16_le(header, 0x08).ok_or(MapError::Truncated)? as usize;
    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        let base = i * 16;
        let chunk = data.get(base..base + 16).ok_or(MapError::Truncated)?;
        let mut points = [Point::new(0.0, 0.0); 4];
        for (j, p) in points.iter_mut().enumerate() {
            *p = Point::new(u16_le(chunk, j * 4).unwrap() as f64, u16_le(chunk, j * 4 + 2).unwrap() as f64);
        }
        out.push(Area { points });
    }
    Ok(out)
}

/// Variable record size (6/10/28 bytes), inferred from `data.len() / obstacle_pairs`.
fn parse_obstacles(data: &[u8], header: &[u8]) -> Result<Vec<Obstacle>, MapError> {
    let pairs = u16_le(header, 0x08).ok_or(MapError::Truncated)? as usize;
    if pairs == 0 {
        return Ok(Vec::new());
    }
    if data.len() % pairs != 0 {
        return Err(MapError::MalformedBlock { block_type: u16_le(header, 0x00).unwrap_or(0) });
    }
    let record_size = data.len() / pairs;

    let mut out = Vec::with_capacity(pairs);
    for i in 0..pairs {
        let base = i * record_size;
        let rec = &data[base..base + record_size];
        let x = u16_le(rec, 0).ok_or(MapError::Truncated)? as f64;
        let y = u16_le(rec, 2).ok_or(MapError::Truncated)? as f64;

        let mut kind = None;
        let mut confidence = None;
        let mut photo_name = None;

        if record_size >= 6 {
            kind = u16_le(rec, 4).map(ObstacleKind::from);
        }
        if record_size >= 10 {
            let u1 = u16_le(rec, 6).unwrap_or(0);
            let u2 = u16_le(rec, 8).unwrap_or(0);
            confidence = Some(if u2 == 0 { 0.0 } else { u1 as f64 * 10.0 / u2 as f64 });
            if record_size == 28 && rec[12] > 0 {
                photo_name = std::str::from_utf8(&rec[12..28]).ok().map(|s| s.trim_end_matches('\0').to_string());
            }
        }

        out.push(Obstacle { x, y, kind, confidence, photo_name });
    }
    Ok(out)
}

fn parse_carpet_map(data: &[u8]) -> HashSet<usize> {
    data.iter().enumerate().filter(|(_, &v)| v != 0).map(|(i, _)| i).collect()
}

/// Walk `path`'s single polyline and `mask` in lockstep, starting a new
/// polyline on every 0→1 transition and closing one on 1→0.
fn parse_mop_path(path: &Path, mask: &[u8]) -> Path {
    let mut mop_paths = Vec::new();
    let mut points_num = 0usize;
    for each_path in &path.paths {
        let mut current = Vec::new();
        for (i, point) in each_path.iter().enumerate() {
            if mask.get(i).copied().unwrap_or(0) != 0 {
                current.push(*point);
                let next_is_zero = mask.get(i + 1).copied().unwrap_or(0) == 0;
                if next_is_zero {
                    points_num += current.len();
                    mop_paths.push(std::mem::take(&mut current));
                }
            }
        }
        points_num += current.len();
        mop_paths.push(current);
    }
    Path { point_length: points_num as i32, point_size: path.point_size, angle: path.angle, paths: mop_paths }
}

fn current_vacuum_room(header: &[u8], data: &[u8], _image: &ImageData, robot: Position) -> Option<u8> {
    let header_len = header.len();
    let image_left = i32_le(header, header_len - 12)?;
    let image_top = i32_le(header, header_len - 16)?;
    let image_width = i32_le(header, header_len - 4)?;

    let p = Point::new(robot.x, robot.y).to_image();
    let px = (p.x - image_left as f64).round();
    let py = (p.y - image_top as f64).round();
    if px < 0.0 || py < 0.0 {
        return None;
    }
    crate::raster::room_at_pixel(data, image_width.max(0) as usize, px as usize, py as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(block_type: u16, extra_header: &[u8], data: &[u8]) -> Vec<u8> {
        let header_len = 8 + extra_header.len();
        let mut out = Vec::new();
        out.extend_from_slice(&block_type.to_le_bytes());
        out.extend_from_slice(&(header_len as u16).to_le_bytes());
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(extra_header);
        out.extend_from_slice(data);
        out
    }

    fn top_header(body_len: usize) -> Vec<u8> {
        let mut h = vec![0u8; 0x14];
        h[0x02..0x04].copy_from_slice(&0x14u16.to_le_bytes());
        h[0x0C..0x10].copy_from_slice(&1u32.to_le_bytes());
        h[0x10..0x14].copy_from_slice(&(body_len as u32).to_le_bytes());
        h
    }

    #[test]
    fn charger_and_robot_position_and_digest() {
        let charger_data = {
            let mut d = vec![0u8; 12];
            d[0..4].copy_from_slice(&1000i32.to_le_bytes());
            d[4..8].copy_from_slice(&2000i32.to_le_bytes());
            d[8..12].copy_from_slice(&90i32.to_le_bytes());
            d
        };
        let robot_data = {
            let mut d = vec![0u8; 12];
            d[0..4].copy_from_slice(&1200i32.to_le_bytes());
            d[4..8].copy_from_slice(&2100i32.to_le_bytes());
            d[8..12].copy_from_slice(&180i32.to_le_bytes());
            d
        };

        let mut raw = top_header(0);
        raw.extend(block(CHARGER, &[], &charger_data));
        raw.extend(block(ROBOT_POSITION, &[], &robot_data));
        raw.extend(block(DIGEST, &[], &[]));

        let map = parse(&raw).unwrap();
        assert_eq!(map.charger, Some(Position { x: 1000.0, y: 2000.0, angle: Some(90) }));
        assert_eq!(map.robot_position, Some(Position { x: 1200.0, y: 2100.0, angle: Some(180) }));
        assert!(map.is_valid);
    }

    #[test]
    fn image_block_reports_declared_dimensions() {
        let width = 2i32;
        let height = 2i32;
        let pixels = vec![0xFFu8; (width * height) as usize];
        let mut extra = vec![0u8; 16];
        extra[0..4].copy_from_slice(&0i32.to_le_bytes()); // top
        extra[4..8].copy_from_slice(&0i32.to_le_bytes()); // left
        extra[8..12].copy_from_slice(&height.to_le_bytes());
        extra[12..16].copy_from_slice(&width.to_le_bytes());

        let mut raw = top_header(0);
        raw.extend(block(IMAGE, &extra, &pixels));
        raw.extend(block(DIGEST, &[], &[]));

        let map = parse(&raw).unwrap();
        assert!(map.is_valid);
        let image = map.image.unwrap();
        assert_eq!(image.width, 2);
        assert_eq!(image.height, 2);
    }

    #[test]
    fn obstacle_28_byte_record_with_zero_photo_byte_has_no_name() {
        let mut header = vec![0u8; 10];
        header[0..2].copy_from_slice(&OBSTACLES.to_le_bytes());
        header[2..4].copy_from_slice(&10u16.to_le_bytes());
        header[8..10].copy_from_slice(&1u16.to_le_bytes());

        let mut record = vec![0u8; 28];
        record[8..10].copy_from_slice(&5u16.to_le_bytes());
        record[10..12].copy_from_slice(&10u16.to_le_bytes());
        record[12] = 0;

        let obstacles = parse_obstacles(&record, &header).unwrap();
        assert_eq!(obstacles.len(), 1);
        assert!(obstacles[0].photo_name.is_none());
    }

    #[test]
    fn empty_mop_mask_leaves_path_empty() {
        let path = Path { point_length: 2, point_size: 1, angle: 0, paths: vec![vec![Point::new(0.0, 0.0), Point::new(1.0, 1.0)]] };
        let mop = parse_mop_path(&path, &[0, 0]);
        assert_eq!(mop.paths, vec![Vec::<Point>::new()]);
    }
}
