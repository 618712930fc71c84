//! The tile-cache codec.
//!
//! A world's derived tile grid can be large; the `worlds.tile_cache`
//! column holds a gzip-compressed JSON snapshot so `get_world_tiles` does
//! not have to rescan the `tiles` table on every call. The cache is an
//! optimization, never primary state: any world mutation nulls it and the
//! next read rebuilds it.

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

use loreforge_types::Tile;

use crate::error::StoreError;

/// Compress a tile grid into the cache-column representation.
pub fn compress(tiles: &[Tile]) -> Result<Vec<u8>, StoreError> {
    let json = serde_json::to_vec(tiles)?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&json)?;
    Ok(encoder.finish()?)
}

/// Decompress a cache-column blob back into the tile grid.
pub fn decompress(blob: &[u8]) -> Result<Vec<Tile>, StoreError> {
    let mut decoder = GzDecoder::new(blob);
    let mut json = Vec::new();
    decoder.read_to_end(&mut json)?;
    Ok(serde_json::from_slice(&json)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use loreforge_types::WorldId;

    use super::*;

    fn grid(count: i64) -> Vec<Tile> {
        (0..count)
            .map(|i| Tile {
                world_id: WorldId::new("w-1"),
                x: i % 10,
                y: i / 10,
                terrain: if i % 3 == 0 {
                    String::from("forest")
                } else {
                    String::from("plains")
                },
                region_id: None,
            })
            .collect()
    }

    #[test]
    fn compress_decompress_is_identity() {
        let tiles = grid(100);
        let blob = compress(&tiles).unwrap();
        let restored = decompress(&blob).unwrap();
        assert_eq!(restored, tiles);
    }

    #[test]
    fn compression_actually_shrinks_repetitive_grids() {
        let tiles = grid(1000);
        let json_len = serde_json::to_vec(&tiles).unwrap().len();
        let blob = compress(&tiles).unwrap();
        assert!(blob.len() < json_len / 4);
    }

    #[test]
    fn garbage_blob_is_rejected() {
        assert!(decompress(&[0x00, 0x01, 0x02]).is_err());
    }

    #[test]
    fn empty_grid_round_trips() {
        let blob = compress(&[]).unwrap();
        assert_eq!(decompress(&blob).unwrap(), Vec::<Tile>::new());
    }
}
