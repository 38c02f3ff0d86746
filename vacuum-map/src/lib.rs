//! Parses the binary map blob returned by `get_map_v1` and composites the
//! decoded vector layers back onto its raster for display.

pub mod error;
pub mod model;
pub mod parser;
pub mod raster;
pub mod render;

pub use error::MapError;
pub use model::*;
pub use parser::parse;
pub use render::{render, RenderOptions, Rotation};

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

    fn top_header() -> Vec<u8> {
        let mut h = vec![0u8; 0x14];
        h[0x02..0x04].copy_from_slice(&0x14u16.to_le_bytes());
        h[0x0C..0x10].copy_from_slice(&1u32.to_le_bytes());
        h
    }

    /// End-to-end: charger + robot position + a 2x2 all-inside image + digest.
    #[test]
    fn parses_a_minimal_complete_map() {
        const CHARGER: u16 = 1;
        const ROBOT_POSITION: u16 = 8;
        const IMAGE: u16 = 2;
        const DIGEST: u16 = 1024;

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
        let mut image_header = vec![0u8; 16];
        image_header[8..12].copy_from_slice(&2i32.to_le_bytes());
        image_header[12..16].copy_from_slice(&2i32.to_le_bytes());
        let image_data = vec![0xFFu8; 4];

        let mut raw = top_header();
        raw.extend(block(CHARGER, &[], &charger_data));
        raw.extend(block(ROBOT_POSITION, &[], &robot_data));
        raw.extend(block(IMAGE, &image_header, &image_data));
        raw.extend(block(DIGEST, &[], &[]));

        let map = parse(&raw).unwrap();
        assert!(map.is_valid);
        assert_eq!(map.charger.unwrap().angle, Some(90));
        assert_eq!(map.robot_position.unwrap().angle, Some(180));
        assert_eq!(map.image.unwrap().width, 2);
    }

    #[test]
    fn truncated_blob_is_rejected() {
        let err = parse(&[0u8; 4]).unwrap_err();
        assert_eq!(err, MapError::Truncated);
    }
}
