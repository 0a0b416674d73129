//! Asset and scene precompilation.
//!
//! Symbols for every asset are claimed sequentially first; the asset classes
//! are then encoded in parallel, each on its own scoped thread, since they
//! write disjoint symbol namespaces. Scenes and palettes are resolved last
//! because they read the encoded background and sprite tables.

mod backgrounds;
mod palettes;
mod scenes;
mod sprites;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::thread::ScopedJoinHandle;

use crate::encode::{AssetEncoder, EncodeContext};
use crate::error::{CompileError, Result};
use crate::platform::TargetPlatform;
use crate::project::ProjectResources;
use crate::report::Reporter;
use crate::resolve::{ReferencedAsset, UsedAssetResolver};
use crate::schema::{ArgKind, EventSchema};
use crate::symbols::SymbolAllocator;
use crate::template::ensure_project_asset;
use crate::walk::CustomEventLookup;

pub use backgrounds::{BackgroundTables, PrecompiledBackground};
pub use palettes::{DmgRow, PaletteTables, PrecompiledPalette};
pub use scenes::{PrecompiledActor, PrecompiledScene, PrecompiledTrigger, Projectile, scene_hash};
pub use sprites::{PrecompiledSprite, SpriteTables};

#[derive(Debug, Clone, PartialEq)]
pub struct PrecompiledTileset {
    pub symbol: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrecompiledTilemap {
    pub symbol: String,
    pub data: Vec<u8>,
}

/// An encoded file asset with the symbol it is emitted under.
#[derive(Debug, Clone, PartialEq)]
pub struct PrecompiledAsset {
    pub id: String,
    pub name: String,
    pub symbol: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct UiTiles {
    pub frame: Vec<u8>,
    pub cursor: Vec<u8>,
}

pub struct Precompiled {
    /// Global variable ids referenced anywhere in the project.
    pub variables: Vec<String>,
    pub backgrounds: BackgroundTables,
    pub tilesets: Vec<PrecompiledAsset>,
    pub sprites: SpriteTables,
    pub fonts: Vec<PrecompiledAsset>,
    pub avatars: Vec<PrecompiledAsset>,
    pub emotes: Vec<PrecompiledAsset>,
    pub music: Vec<PrecompiledAsset>,
    pub sounds: Vec<PrecompiledAsset>,
    pub ui: UiTiles,
    pub scenes: Vec<PrecompiledScene>,
    pub palettes: PaletteTables,
    symbol_lookup: HashMap<ArgKind, HashMap<String, String>>,
}

impl Precompiled {
    /// Symbol an event argument of class `kind` refers to.
    pub fn symbol_for(&self, kind: ArgKind, id: &str) -> Option<&str> {
        self.symbol_lookup
            .get(&kind)
            .and_then(|ids| ids.get(id))
            .map(String::as_str)
    }
}

pub struct PrecompileInput<'a> {
    pub project: &'a ProjectResources,
    pub project_root: &'a Path,
    pub target: TargetPlatform,
    pub schema: &'a EventSchema,
    pub custom_events: &'a CustomEventLookup<'a>,
}

struct FileJob {
    id: String,
    name: String,
    symbol: String,
    path: PathBuf,
}

fn file_jobs<T>(
    used: &[ReferencedAsset<T>],
    symbols: &mut SymbolAllocator,
    fallback: &str,
    fields: impl Fn(&T) -> (&str, &str, &str, PathBuf),
) -> Vec<FileJob> {
    used.iter()
        .map(|r| {
            let (id, name, symbol, path) = fields(&r.asset);
            FileJob {
                id: id.to_string(),
                name: name.to_string(),
                symbol: symbols.allocate(symbol, &format!("{}_{}", fallback, name)),
                path,
            }
        })
        .collect()
}

fn encode_files(
    jobs: &[FileJob],
    encode: impl Fn(&Path) -> Result<Vec<u8>>,
) -> Result<Vec<PrecompiledAsset>> {
    jobs.iter()
        .map(|job| {
            Ok(PrecompiledAsset {
                id: job.id.clone(),
                name: job.name.clone(),
                symbol: job.symbol.clone(),
                data: encode(&job.path)?,
            })
        })
        .collect()
}

fn join<T>(handle: ScopedJoinHandle<'_, T>) -> T {
    handle
        .join()
        .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
}

struct Encoded {
    backgrounds: Vec<crate::encode::EncodedBackground>,
    sprites: Vec<crate::encode::EncodedSprite>,
    tilesets: Vec<PrecompiledAsset>,
    fonts: Vec<PrecompiledAsset>,
    avatars: Vec<PrecompiledAsset>,
    emotes: Vec<PrecompiledAsset>,
    music: Vec<PrecompiledAsset>,
    sounds: Vec<PrecompiledAsset>,
    ui: UiTiles,
}

pub fn precompile(
    input: &PrecompileInput<'_>,
    encoder: &dyn AssetEncoder,
    symbols: &mut SymbolAllocator,
    reporter: &Reporter,
) -> Result<Precompiled> {
    let project = input.project;
    let root = input.project_root;
    let used = UsedAssetResolver::new(project, input.schema, input.custom_events).resolve();

    reporter.progress("Preparing variables...");
    let variables = used.variables.clone();

    if used.fonts.is_empty() {
        ensure_project_asset(root, "assets/fonts/gbs-mono.png", reporter)?;
        ensure_project_asset(root, "assets/fonts/gbs-mono.json", reporter)?;
        return Err(CompileError::MissingFonts);
    }

    reporter.progress("Preparing UI...");
    let frame_path = ensure_project_asset(root, "assets/ui/frame.png", reporter)?;
    let cursor_path = ensure_project_asset(root, "assets/ui/cursor.png", reporter)?;

    let background_jobs = backgrounds::plan(&used.backgrounds, project, symbols);
    let sprite_jobs = sprites::plan(&used.sprites, project.settings.sprite_mode, symbols);
    let tileset_jobs = file_jobs(&used.tilesets, symbols, "tileset", |t| {
        (t.id.as_str(), t.name.as_str(), t.symbol.as_str(), t.path(root))
    });
    let font_jobs = file_jobs(&used.fonts, symbols, "font", |f| {
        (f.id.as_str(), f.name.as_str(), f.symbol.as_str(), f.path(root))
    });
    let avatar_jobs = file_jobs(&used.avatars, symbols, "avatar", |a| {
        (a.id.as_str(), a.name.as_str(), a.symbol.as_str(), a.path(root))
    });
    let emote_jobs = file_jobs(&used.emotes, symbols, "emote", |e| {
        (e.id.as_str(), e.name.as_str(), e.symbol.as_str(), e.path(root))
    });
    let sound_jobs = file_jobs(&used.sounds, symbols, "sound", |s| {
        (s.id.as_str(), s.name.as_str(), s.symbol.as_str(), s.path(root))
    });
    let (music_jobs, music_lookup) = music_plan(&used.music, root, symbols);

    let ctx = EncodeContext {
        project_root: root,
        color_mode: project.settings.color_mode,
    };

    reporter.progress("Preparing images...");
    reporter.progress("Preparing sprites...");
    reporter.progress("Preparing music...");
    let encoded = std::thread::scope(|s| -> Result<Encoded> {
        let backgrounds = s.spawn(|| backgrounds::encode(&background_jobs, encoder, &ctx));
        let sprites = s.spawn(|| sprites::encode(&sprite_jobs, encoder, &ctx));
        let tilesets = s.spawn(|| encode_files(&tileset_jobs, |p| encoder.tiles(p)));
        let fonts = s.spawn(|| encode_files(&font_jobs, |p| encoder.tiles(p)));
        let avatars = s.spawn(|| encode_files(&avatar_jobs, |p| encoder.tiles(p)));
        let emotes = s.spawn(|| encode_files(&emote_jobs, |p| encoder.tiles(p)));
        let music = s.spawn(|| encode_files(&music_jobs, |p| encoder.audio(p)));
        let sounds = s.spawn(|| encode_files(&sound_jobs, |p| encoder.audio(p)));
        let ui = s.spawn(|| -> Result<UiTiles> {
            Ok(UiTiles {
                frame: encoder.tiles(&frame_path)?,
                cursor: encoder.tiles(&cursor_path)?,
            })
        });
        Ok(Encoded {
            backgrounds: join(backgrounds)?,
            sprites: join(sprites)?,
            tilesets: join(tilesets)?,
            fonts: join(fonts)?,
            avatars: join(avatars)?,
            emotes: join(emotes)?,
            music: join(music)?,
            sounds: join(sounds)?,
            ui: join(ui)?,
        })
    })?;

    let background_tables = backgrounds::assemble(&background_jobs, encoded.backgrounds);
    let sprite_tables = sprites::assemble(&sprite_jobs, encoded.sprites);

    reporter.progress("Preparing scenes...");
    let scenes = scenes::precompile_scenes(
        project,
        input.custom_events,
        input.target.limits(),
        &background_tables,
        &sprite_tables,
        symbols,
        reporter,
    )?;
    let palettes = palettes::precompile_palettes(project, &background_tables);

    let mut symbol_lookup: HashMap<ArgKind, HashMap<String, String>> = HashMap::new();
    {
        let mut add = |kind: ArgKind, id: &str, symbol: &str| {
            symbol_lookup
                .entry(kind)
                .or_default()
                .entry(id.to_string())
                .or_insert_with(|| symbol.to_string());
        };
        for bg in &background_tables.backgrounds {
            add(ArgKind::Background, &bg.id, &bg.symbol);
        }
        for sprite in &sprite_tables.sprites {
            add(ArgKind::Sprite, &sprite.id, &sprite.symbol);
        }
        for (kind, assets) in [
            (ArgKind::Tileset, &encoded.tilesets),
            (ArgKind::Font, &encoded.fonts),
            (ArgKind::Avatar, &encoded.avatars),
            (ArgKind::Emote, &encoded.emotes),
            (ArgKind::Sound, &encoded.sounds),
        ] {
            for asset in assets {
                add(kind, &asset.id, &asset.symbol);
            }
        }
        for (id, symbol) in &music_lookup {
            add(ArgKind::Music, id, symbol);
        }
        for scene in &scenes {
            add(ArgKind::Scene, &scene.scene.id, &scene.symbol);
        }
    }

    reporter.progress("Preparation complete");

    Ok(Precompiled {
        variables,
        backgrounds: background_tables,
        tilesets: encoded.tilesets,
        sprites: sprite_tables,
        fonts: encoded.fonts,
        avatars: encoded.avatars,
        emotes: encoded.emotes,
        music: encoded.music,
        sounds: encoded.sounds,
        ui: encoded.ui,
        scenes,
        palettes,
        symbol_lookup,
    })
}

/// Several referenced ids can resolve to one track after driver fallback;
/// each distinct track is encoded once.
fn music_plan(
    used: &[ReferencedAsset<crate::project::MusicTrack>],
    root: &Path,
    symbols: &mut SymbolAllocator,
) -> (Vec<FileJob>, HashMap<String, String>) {
    let mut jobs: Vec<FileJob> = Vec::new();
    let mut by_source: HashMap<(String, String), String> = HashMap::new();
    let mut lookup = HashMap::new();
    for track in used {
        let track = &track.asset;
        let source = (track.symbol.clone(), track.filename.clone());
        let symbol = match by_source.get(&source) {
            Some(symbol) => symbol.clone(),
            None => {
                let symbol = symbols.allocate(&track.symbol, &format!("song_{}", track.name));
                by_source.insert(source, symbol.clone());
                jobs.push(FileJob {
                    id: track.id.clone(),
                    name: track.name.clone(),
                    symbol: symbol.clone(),
                    path: track.path(root),
                });
                symbol
            }
        };
        lookup.insert(track.id.clone(), symbol);
    }
    (jobs, lookup)
}
