//! Media encoding seam.
//!
//! Precompilers only depend on [`AssetEncoder`]; [`TileEncoder`] is the
//! built-in implementation turning PNGs into 2bpp tile data.

use std::collections::HashMap;
use std::path::Path;

use image::GrayImage;

use crate::error::{CompileError, Result};
use crate::project::{Background, ColorMode, Palette, SpriteSheet, Tileset};

/// Bytes per 8x8 2bpp tile.
pub const TILE_SIZE: usize = 16;
/// Tiles addressable by one VRAM bank.
pub const BANK_TILES: usize = 256;
/// Sprite tiles that fit in one VRAM bank next to the background.
pub const SPRITE_BANK_TILES: usize = 128;

pub struct EncodeContext<'a> {
    pub project_root: &'a Path,
    pub color_mode: ColorMode,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EncodedBackground {
    /// Tile data for VRAM bank 1 and bank 2.
    pub vram: [Vec<u8>; 2],
    pub tilemap: Vec<u8>,
    pub attr: Vec<u8>,
    /// Size in tiles.
    pub width: u32,
    pub height: u32,
    pub auto_palettes: Option<Vec<Palette>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EncodedSprite {
    pub vram: [Vec<u8>; 2],
    pub num_tiles: usize,
}

pub trait AssetEncoder: Send + Sync {
    fn background(
        &self,
        background: &Background,
        common_tileset: Option<&Tileset>,
        ctx: &EncodeContext<'_>,
    ) -> Result<EncodedBackground>;

    fn sprite(&self, sprite: &SpriteSheet, ctx: &EncodeContext<'_>) -> Result<EncodedSprite>;

    /// Raw tile data of an image, used for tilesets, UI, fonts, avatars and emotes.
    fn tiles(&self, path: &Path) -> Result<Vec<u8>>;

    /// Music or sound payload.
    fn audio(&self, path: &Path) -> Result<Vec<u8>>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TileEncoder;

type Tile = [u8; TILE_SIZE];

impl TileEncoder {
    fn load(path: &Path) -> Result<(Vec<Tile>, u32, u32)> {
        let image = image::open(path)
            .map_err(|e| CompileError::encode(path.display().to_string(), e))?
            .to_luma8();
        let (w, h) = (image.width() / 8, image.height() / 8);
        let mut tiles = Vec::with_capacity((w * h) as usize);
        for ty in 0..h {
            for tx in 0..w {
                tiles.push(encode_tile(&image, tx * 8, ty * 8));
            }
        }
        Ok((tiles, w, h))
    }
}

fn shade(luma: u8) -> u8 {
    match luma {
        192..=255 => 0,
        128..=191 => 1,
        64..=127 => 2,
        _ => 3,
    }
}

fn encode_tile(image: &GrayImage, x0: u32, y0: u32) -> Tile {
    let mut tile = [0u8; TILE_SIZE];
    for row in 0..8 {
        let (mut lo, mut hi) = (0u8, 0u8);
        for col in 0..8 {
            let value = shade(image.get_pixel(x0 + col, y0 + row).0[0]);
            let bit = 7 - col;
            lo |= (value & 1) << bit;
            hi |= ((value >> 1) & 1) << bit;
        }
        tile[row as usize * 2] = lo;
        tile[row as usize * 2 + 1] = hi;
    }
    tile
}

impl AssetEncoder for TileEncoder {
    fn background(
        &self,
        background: &Background,
        common_tileset: Option<&Tileset>,
        ctx: &EncodeContext<'_>,
    ) -> Result<EncodedBackground> {
        let (tiles, width, height) = Self::load(&background.path(ctx.project_root))?;

        let mut unique: Vec<Tile> = Vec::new();
        let mut index: HashMap<Tile, usize> = HashMap::new();
        if let Some(common) = common_tileset {
            let (common_tiles, _, _) = Self::load(&common.path(ctx.project_root))?;
            for tile in common_tiles {
                index.entry(tile).or_insert_with(|| {
                    unique.push(tile);
                    unique.len() - 1
                });
            }
        }

        let color = ctx.color_mode != ColorMode::Mono;
        let mut tilemap = Vec::with_capacity(tiles.len());
        let mut attr = Vec::new();
        for tile in &tiles {
            let i = *index.entry(*tile).or_insert_with(|| {
                unique.push(*tile);
                unique.len() - 1
            });
            tilemap.push((i % BANK_TILES) as u8);
            if color {
                attr.push(if i >= BANK_TILES { 0x08 } else { 0x00 });
            }
        }

        let split = unique.len().min(BANK_TILES);
        let bank1 = unique[..split].concat();
        let bank2 = if color { unique[split..].concat() } else { Vec::new() };
        if !color && attr.iter().any(|a| *a != 0) {
            attr.clear();
        }

        Ok(EncodedBackground {
            vram: [bank1, bank2],
            tilemap,
            attr,
            width,
            height,
            auto_palettes: None,
        })
    }

    fn sprite(&self, sprite: &SpriteSheet, ctx: &EncodeContext<'_>) -> Result<EncodedSprite> {
        let (tiles, _, _) = Self::load(&sprite.path(ctx.project_root))?;
        let split = tiles.len().min(SPRITE_BANK_TILES);
        Ok(EncodedSprite {
            vram: [tiles[..split].concat(), tiles[split..].concat()],
            num_tiles: tiles.len(),
        })
    }

    fn tiles(&self, path: &Path) -> Result<Vec<u8>> {
        let (tiles, _, _) = Self::load(path)?;
        Ok(tiles.concat())
    }

    fn audio(&self, path: &Path) -> Result<Vec<u8>> {
        std::fs::read(path).map_err(|e| CompileError::io_path("read", path, e))
    }
}
