use super::PrecompiledTileset;
use crate::encode::{AssetEncoder, EncodeContext, EncodedSprite};
use crate::error::Result;
use crate::project::{SpriteMode, SpriteSheet};
use crate::resolve::ReferencedAsset;
use crate::symbols::SymbolAllocator;

#[derive(Debug, Clone)]
pub struct PrecompiledSprite {
    pub id: String,
    pub name: String,
    pub symbol: String,
    pub sprite_mode: SpriteMode,
    pub num_tiles: usize,
    pub tileset: String,
    pub bank2_tileset: Option<String>,
}

impl PrecompiledSprite {
    /// VRAM tiles the sheet occupies in `mode`.
    pub fn tile_count(&self, mode: SpriteMode) -> usize {
        match mode {
            SpriteMode::Mode8x16 => self.num_tiles * 2,
            SpriteMode::Mode8x8 => self.num_tiles,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SpriteTables {
    pub sprites: Vec<PrecompiledSprite>,
    pub tilesets: Vec<PrecompiledTileset>,
}

impl SpriteTables {
    pub fn get(&self, id: &str) -> Option<&PrecompiledSprite> {
        self.sprites.iter().find(|s| s.id == id)
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.sprites.iter().position(|s| s.id == id)
    }
}

pub(super) struct SpriteJob<'a> {
    sprite: &'a SpriteSheet,
    mode: SpriteMode,
    symbol: String,
}

pub(super) fn plan<'a>(
    used: &'a [ReferencedAsset<SpriteSheet>],
    default_mode: SpriteMode,
    symbols: &mut SymbolAllocator,
) -> Vec<SpriteJob<'a>> {
    used.iter()
        .map(|r| SpriteJob {
            sprite: &r.asset,
            mode: r.asset.sprite_mode.unwrap_or(default_mode),
            symbol: symbols.allocate(&r.asset.symbol, &format!("sprite_{}", r.asset.name)),
        })
        .collect()
}

pub(super) fn encode(
    jobs: &[SpriteJob<'_>],
    encoder: &dyn AssetEncoder,
    ctx: &EncodeContext<'_>,
) -> Result<Vec<EncodedSprite>> {
    jobs.iter().map(|job| encoder.sprite(job.sprite, ctx)).collect()
}

pub(super) fn assemble(jobs: &[SpriteJob<'_>], encoded: Vec<EncodedSprite>) -> SpriteTables {
    let mut tables = SpriteTables::default();
    for (job, encoded) in jobs.iter().zip(encoded) {
        let [bank1, bank2] = encoded.vram;
        let tileset = format!("{}_tileset", job.symbol);
        tables.tilesets.push(PrecompiledTileset {
            symbol: tileset.clone(),
            data: bank1,
        });
        let bank2_tileset = (!bank2.is_empty()).then(|| {
            let symbol = format!("{}_bank2_tileset", job.symbol);
            tables.tilesets.push(PrecompiledTileset {
                symbol: symbol.clone(),
                data: bank2,
            });
            symbol
        });
        tables.sprites.push(PrecompiledSprite {
            id: job.sprite.id.clone(),
            name: job.sprite.name.clone(),
            symbol: job.symbol.clone(),
            sprite_mode: job.mode,
            num_tiles: encoded.num_tiles,
            tileset,
            bank2_tileset,
        });
    }
    tables
}
