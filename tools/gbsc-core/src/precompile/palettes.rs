//! Per-scene palette sets, deduplicated project-wide.

use std::collections::HashMap;

use indexmap::IndexMap;

use super::BackgroundTables;
use crate::hash::{ContentKey, StableHasher};
use crate::project::{DMG_PALETTE_ID, Palette, ProjectResources, dmg_palette};

/// Shade names for one monochrome palette register.
pub type DmgRow = [&'static str; 4];

const DMG_BACKGROUND: [DmgRow; 1] = [["DMG_WHITE", "DMG_LITE_GRAY", "DMG_DARK_GRAY", "DMG_BLACK"]];
const DMG_SPRITES: [DmgRow; 2] = [
    ["DMG_WHITE", "DMG_WHITE", "DMG_LITE_GRAY", "DMG_BLACK"],
    ["DMG_WHITE", "DMG_WHITE", "DMG_DARK_GRAY", "DMG_BLACK"],
];

/// Number of hardware palettes per layer.
pub const PALETTE_SLOTS: usize = 8;

#[derive(Debug, Clone, PartialEq)]
pub struct PrecompiledPalette {
    pub symbol: String,
    pub dmg: Vec<DmgRow>,
    /// Hex colors per slot; absent for monochrome projects.
    pub colors: Option<Vec<[String; 4]>>,
}

impl PrecompiledPalette {
    fn key(&self) -> ContentKey {
        let mut hasher = StableHasher::new("palette-set");
        hasher.tag("dmg").u64(self.dmg.len() as u64);
        for row in &self.dmg {
            for shade in row {
                hasher.str(shade);
            }
        }
        hasher.value(&self.colors);
        hasher.finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct PaletteTables {
    pub palettes: Vec<PrecompiledPalette>,
    /// Scene id to background palette index.
    pub scene_background: HashMap<String, usize>,
    /// Scene id to sprite palette index.
    pub scene_sprites: HashMap<String, usize>,
}

pub fn palette_symbol(index: usize) -> String {
    format!("palette_{}", index)
}

struct PaletteResolver<'a> {
    lookup: HashMap<&'a str, &'a Palette>,
    dmg: Palette,
}

impl<'a> PaletteResolver<'a> {
    fn new(palettes: &'a [Palette]) -> Self {
        PaletteResolver {
            lookup: palettes.iter().map(|p| (p.id.as_str(), p)).collect(),
            dmg: dmg_palette(),
        }
    }

    fn get(&self, id: Option<&String>, fallback: Option<&String>) -> &Palette {
        if id.map(String::as_str) == Some(DMG_PALETTE_ID) {
            return &self.dmg;
        }
        id.and_then(|id| self.lookup.get(id.as_str()))
            .or_else(|| fallback.and_then(|id| self.lookup.get(id.as_str())))
            .copied()
            .unwrap_or(&self.dmg)
    }
}

#[derive(Default)]
struct Interner {
    palettes: Vec<PrecompiledPalette>,
    index: IndexMap<ContentKey, usize>,
}

impl Interner {
    fn intern(&mut self, mut palette: PrecompiledPalette) -> usize {
        let key = palette.key();
        if let Some(index) = self.index.get(&key) {
            return *index;
        }
        let index = self.palettes.len();
        palette.symbol = palette_symbol(index);
        self.palettes.push(palette);
        self.index.insert(key, index);
        index
    }
}

pub(super) fn precompile_palettes(
    project: &ProjectResources,
    backgrounds: &BackgroundTables,
) -> PaletteTables {
    let settings = &project.settings;
    let color = settings.uses_color_palettes();
    let resolver = PaletteResolver::new(&project.palettes);
    let mut interner = Interner::default();
    let mut tables = PaletteTables::default();

    for scene in &project.scenes {
        let auto = backgrounds
            .find(&scene.background_id)
            .and_then(|i| backgrounds.backgrounds[i].auto_palettes.as_ref());
        let colors = color.then(|| {
            (0..PALETTE_SLOTS)
                .map(|slot| {
                    auto.and_then(|palettes| palettes.get(slot))
                        .unwrap_or_else(|| {
                            resolver.get(
                                scene.palette_ids.get(slot),
                                settings.default_background_palette_ids.get(slot),
                            )
                        })
                        .colors
                        .clone()
                })
                .collect()
        });
        let index = interner.intern(PrecompiledPalette {
            symbol: String::new(),
            dmg: DMG_BACKGROUND.to_vec(),
            colors,
        });
        tables.scene_background.insert(scene.id.clone(), index);
    }

    for scene in &project.scenes {
        let colors = color.then(|| {
            (0..PALETTE_SLOTS)
                .map(|slot| {
                    let c = &resolver
                        .get(
                            scene.sprite_palette_ids.get(slot),
                            settings.default_sprite_palette_ids.get(slot),
                        )
                        .colors;
                    [c[0].clone(), c[0].clone(), c[1].clone(), c[3].clone()]
                })
                .collect()
        });
        let index = interner.intern(PrecompiledPalette {
            symbol: String::new(),
            dmg: DMG_SPRITES.to_vec(),
            colors,
        });
        tables.scene_sprites.insert(scene.id.clone(), index);
    }

    tables.palettes = interner.palettes;
    tables
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::{ColorMode, Scene};

    fn palette(id: &str, first: &str) -> Palette {
        Palette {
            id: id.into(),
            name: id.into(),
            colors: [first.into(), "AAAAAA".into(), "555555".into(), "000000".into()],
        }
    }

    fn scene(id: &str, palette_ids: &[&str]) -> Scene {
        Scene {
            id: id.into(),
            palette_ids: palette_ids.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn identical_scene_palettes_share_one_symbol() {
        let mut project = ProjectResources::default();
        project.settings.color_mode = ColorMode::Color;
        project.palettes = vec![palette("red", "FF0000"), palette("blue", "0000FF")];
        project.scenes = vec![
            scene("s1", &["red"]),
            scene("s2", &["red"]),
            scene("s3", &["blue"]),
        ];
        let tables = precompile_palettes(&project, &BackgroundTables::default());

        let s1 = tables.scene_background["s1"];
        assert_eq!(s1, tables.scene_background["s2"]);
        assert_ne!(s1, tables.scene_background["s3"]);
        assert_eq!(tables.palettes[s1].symbol, palette_symbol(s1));
        // Slots without an id fall back to the monochrome palette.
        let colors = tables.palettes[s1].colors.as_ref().unwrap();
        assert_eq!(colors[0][0], "FF0000");
        assert_eq!(colors[1], dmg_palette().colors);
        // All scenes share one sprite palette set.
        assert_eq!(tables.scene_sprites["s1"], tables.scene_sprites["s3"]);
        assert_eq!(tables.palettes.len(), 3);
    }

    #[test]
    fn sprite_palettes_repeat_the_transparent_color() {
        let mut project = ProjectResources::default();
        project.settings.sgb_enabled = true;
        project.palettes = vec![palette("p", "123456")];
        project.scenes = vec![Scene {
            id: "s".into(),
            sprite_palette_ids: vec!["p".into()],
            ..Default::default()
        }];
        let tables = precompile_palettes(&project, &BackgroundTables::default());
        let sprites = &tables.palettes[tables.scene_sprites["s"]];
        let first = &sprites.colors.as_ref().unwrap()[0];
        assert_eq!(first, &["123456", "123456", "AAAAAA", "000000"].map(String::from));
        assert_eq!(sprites.dmg.len(), 2);
    }

    #[test]
    fn monochrome_projects_emit_two_palettes() {
        let mut project = ProjectResources::default();
        project.scenes = vec![scene("a", &["x"]), scene("b", &[])];
        let tables = precompile_palettes(&project, &BackgroundTables::default());
        assert_eq!(tables.palettes.len(), 2);
        assert!(tables.palettes.iter().all(|p| p.colors.is_none()));
    }
}
