use std::collections::HashMap;

use indexmap::IndexMap;

use super::{PrecompiledTilemap, PrecompiledTileset};
use crate::encode::{AssetEncoder, EncodeContext, EncodedBackground};
use crate::error::Result;
use crate::hash::{ContentKey, hash_bytes};
use crate::project::{Background, Palette, ProjectResources, Tileset};
use crate::resolve::ReferencedAsset;
use crate::symbols::SymbolAllocator;

#[derive(Debug, Clone)]
pub struct PrecompiledBackground {
    pub id: String,
    pub name: String,
    pub symbol: String,
    /// Tileset shared with the scenes that use this variant.
    pub common_tileset_id: Option<String>,
    /// Size in tiles.
    pub width: u32,
    pub height: u32,
    pub tileset: Option<String>,
    pub cgb_tileset: Option<String>,
    pub tilemap: Option<String>,
    pub tilemap_attr: Option<String>,
    pub auto_palettes: Option<Vec<Palette>>,
}

#[derive(Debug, Clone, Default)]
pub struct BackgroundTables {
    /// One entry per (background, common tileset) pair in use.
    pub backgrounds: Vec<PrecompiledBackground>,
    pub tilesets: Vec<PrecompiledTileset>,
    pub tilemaps: Vec<PrecompiledTilemap>,
    pub tilemap_attrs: Vec<PrecompiledTilemap>,
}

impl BackgroundTables {
    /// Index of the variant built against `tileset_id`, if any.
    pub fn find_with_tileset(&self, background_id: &str, tileset_id: &str) -> Option<usize> {
        self.backgrounds.iter().position(|bg| {
            bg.id == background_id
                && (tileset_id.is_empty() || bg.common_tileset_id.as_deref() == Some(tileset_id))
        })
    }

    pub fn find(&self, background_id: &str) -> Option<usize> {
        self.backgrounds.iter().position(|bg| bg.id == background_id)
    }
}

pub(super) struct BackgroundJob<'a> {
    background: &'a Background,
    common: Option<&'a Tileset>,
    symbol: String,
}

/// Expands each used background into one job per common tileset any scene
/// pairs it with.
pub(super) fn plan<'a>(
    used: &'a [ReferencedAsset<Background>],
    project: &'a ProjectResources,
    symbols: &mut SymbolAllocator,
) -> Vec<BackgroundJob<'a>> {
    let mut common: IndexMap<&str, Vec<&Tileset>> = IndexMap::new();
    for scene in &project.scenes {
        if scene.background_id.is_empty() || scene.tileset_id.is_empty() {
            continue;
        }
        let Some(tileset) = project.tilesets.iter().find(|t| t.id == scene.tileset_id) else {
            continue;
        };
        let entry = common.entry(scene.background_id.as_str()).or_default();
        if !entry.iter().any(|t| t.id == tileset.id) {
            entry.push(tileset);
        }
    }

    let mut jobs = Vec::new();
    for used in used {
        let background = &used.asset;
        let variants: Vec<Option<&Tileset>> = match common.get(background.id.as_str()) {
            Some(tilesets) if !tilesets.is_empty() => tilesets.iter().copied().map(Some).collect(),
            _ => vec![None],
        };
        for common in variants {
            let symbol = symbols.allocate(&background.symbol, &format!("bg_{}", background.name));
            jobs.push(BackgroundJob {
                background,
                common,
                symbol,
            });
        }
    }
    jobs
}

pub(super) fn encode(
    jobs: &[BackgroundJob<'_>],
    encoder: &dyn AssetEncoder,
    ctx: &EncodeContext<'_>,
) -> Result<Vec<EncodedBackground>> {
    jobs.iter()
        .map(|job| encoder.background(job.background, job.common, ctx))
        .collect()
}

/// Every emitted tileset is remembered by content, but only backgrounds
/// sharing a common tileset may point at an existing one.
fn intern_tileset(
    cache: &mut HashMap<ContentKey, String>,
    tilesets: &mut Vec<PrecompiledTileset>,
    can_reuse: bool,
    data: Vec<u8>,
    symbol: String,
) -> String {
    let key = hash_bytes("tileset", &data);
    if can_reuse {
        if let Some(existing) = cache.get(&key) {
            return existing.clone();
        }
    }
    cache.insert(key, symbol.clone());
    tilesets.push(PrecompiledTileset {
        symbol: symbol.clone(),
        data,
    });
    symbol
}

pub(super) fn assemble(
    jobs: &[BackgroundJob<'_>],
    encoded: Vec<EncodedBackground>,
) -> BackgroundTables {
    let mut cache = HashMap::new();
    let mut tables = BackgroundTables::default();

    for (job, encoded) in jobs.iter().zip(encoded) {
        let can_reuse = job.common.is_some();
        let [bank1, bank2] = encoded.vram;

        let tileset = (!bank1.is_empty()).then(|| {
            intern_tileset(
                &mut cache,
                &mut tables.tilesets,
                can_reuse,
                bank1,
                format!("{}_tileset", job.symbol),
            )
        });
        let cgb_tileset = (!bank2.is_empty()).then(|| {
            intern_tileset(
                &mut cache,
                &mut tables.tilesets,
                can_reuse,
                bank2,
                format!("{}_cgb_tileset", job.symbol),
            )
        });

        let tilemap = (!encoded.tilemap.is_empty()).then(|| {
            let symbol = format!("{}_tilemap", job.symbol);
            tables.tilemaps.push(PrecompiledTilemap {
                symbol: symbol.clone(),
                data: encoded.tilemap,
            });
            symbol
        });
        let tilemap_attr = (!encoded.attr.is_empty()).then(|| {
            let symbol = format!("{}_tilemap_attr", job.symbol);
            tables.tilemap_attrs.push(PrecompiledTilemap {
                symbol: symbol.clone(),
                data: encoded.attr,
            });
            symbol
        });

        tables.backgrounds.push(PrecompiledBackground {
            id: job.background.id.clone(),
            name: job.background.name.clone(),
            symbol: job.symbol.clone(),
            common_tileset_id: job.common.map(|t| t.id.clone()),
            width: encoded.width,
            height: encoded.height,
            tileset,
            cgb_tileset,
            tilemap,
            tilemap_attr,
            auto_palettes: encoded.auto_palettes,
        });
    }
    tables
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::Scene;

    fn encoded(tiles: &[u8]) -> EncodedBackground {
        EncodedBackground {
            vram: [tiles.to_vec(), Vec::new()],
            tilemap: vec![0; 4],
            width: 2,
            height: 2,
            ..Default::default()
        }
    }

    fn project() -> ProjectResources {
        let mut project = ProjectResources::default();
        project.backgrounds = ["a", "b", "c"]
            .iter()
            .map(|id| Background {
                id: id.to_string(),
                symbol: format!("bg_{}", id),
                ..Default::default()
            })
            .collect();
        project.tilesets = vec![Tileset {
            id: "shared".into(),
            ..Default::default()
        }];
        project.scenes = vec![
            Scene {
                background_id: "a".into(),
                tileset_id: "shared".into(),
                ..Default::default()
            },
            Scene {
                background_id: "b".into(),
                tileset_id: "shared".into(),
                ..Default::default()
            },
            Scene {
                background_id: "c".into(),
                ..Default::default()
            },
        ];
        project
    }

    fn used(project: &ProjectResources) -> Vec<ReferencedAsset<Background>> {
        project
            .backgrounds
            .iter()
            .map(|bg| ReferencedAsset {
                asset: bg.clone(),
                referenced_by: Default::default(),
            })
            .collect()
    }

    #[test]
    fn common_tileset_backgrounds_share_identical_tiles() {
        let project = project();
        let used = used(&project);
        let mut symbols = SymbolAllocator::new();
        let jobs = plan(&used, &project, &mut symbols);
        assert_eq!(jobs.len(), 3);

        let tables = assemble(&jobs, vec![encoded(&[1; 16]), encoded(&[1; 16]), encoded(&[1; 16])]);
        let names: Vec<_> = tables.tilesets.iter().map(|t| t.symbol.as_str()).collect();
        // `c` has no common tileset, so it keeps its own copy.
        assert_eq!(names, vec!["bg_a_tileset", "bg_c_tileset"]);
        assert_eq!(tables.backgrounds[1].tileset.as_deref(), Some("bg_a_tileset"));
        assert_eq!(tables.tilemaps.len(), 3);
        assert_eq!(tables.find_with_tileset("b", "shared"), Some(1));
        assert_eq!(tables.find_with_tileset("c", "shared"), None);
        assert_eq!(tables.find("c"), Some(2));
    }
}
