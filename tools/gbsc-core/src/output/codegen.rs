//! C and assembly sources for every precompiled table.

use indexmap::IndexMap;

use super::ArtifactSet;
use crate::encode::TILE_SIZE;
use crate::error::Result;
use crate::hash::hash_bytes;
use crate::precompile::{
    Precompiled, PrecompiledAsset, PrecompiledPalette, PrecompiledScene, PrecompiledTileset,
};
use crate::project::{Actor, ProjectResources};
use crate::script::SceneScripts;
use crate::symbols::SymbolAllocator;
use crate::template::SceneType;

/// Avatars packed into one avatar font.
const AVATARS_PER_FONT: usize = 16;

const NULL_FAR_PTR: &str = "{ .bank = 0, .ptr = 0 }";

pub struct CodegenInput<'a> {
    pub project: &'a ProjectResources,
    pub precompiled: &'a Precompiled,
    /// Entry points per scene, parallel to `precompiled.scenes`.
    pub scene_scripts: &'a [SceneScripts],
    /// Variable id to alias, in variable index order.
    pub variables: &'a IndexMap<String, String>,
    pub used_scene_types: &'a [String],
    pub engine_scene_types: &'a [SceneType],
}

/// Line-oriented text buffer for generated sources.
#[derive(Default)]
struct Source {
    text: String,
}

impl Source {
    fn line(&mut self, line: impl AsRef<str>) -> &mut Self {
        self.text.push_str(line.as_ref());
        self.text.push('\n');
        self
    }

    fn blank(&mut self) -> &mut Self {
        self.text.push('\n');
        self
    }

    fn finish(self) -> String {
        self.text
    }
}

/// Opens a banked data source that defines `bankrefs` and includes `headers`.
fn banked_source(title: &str, bankrefs: &[&str], headers: &[&str]) -> Source {
    let mut src = Source::default();
    src.line("#pragma bank 255")
        .blank()
        .line(format!("// {}", title))
        .blank()
        .line("#include \"gbs_types.h\"")
        .line("#include \"bankdata.h\"");
    for header in headers {
        src.line(format!("#include \"data/{}.h\"", header));
    }
    src.blank();
    for symbol in bankrefs {
        src.line(format!("BANKREF({})", symbol));
    }
    src.blank();
    src
}

/// Header declaring `symbol` with the given C declaration.
fn data_header(symbol: &str, declaration: &str) -> String {
    let guard = format!("DATA_{}_H", symbol.to_uppercase());
    let mut src = Source::default();
    src.line(format!("#ifndef {}", guard))
        .line(format!("#define {}", guard))
        .blank()
        .line("#include \"gbs_types.h\"")
        .line("#include \"bankdata.h\"")
        .blank()
        .line(format!("BANKREF_EXTERN({})", symbol))
        .line(format!("extern {};", declaration))
        .blank()
        .line("#endif");
    src.finish()
}

fn byte_rows(data: &[u8]) -> Vec<String> {
    data.chunks(16)
        .map(|row| {
            let bytes: Vec<String> = row.iter().map(|b| format!("0x{:02X}", b)).collect();
            format!("    {},", bytes.join(", "))
        })
        .collect()
}

fn far_ptr(symbol: Option<&str>) -> String {
    match symbol {
        Some(symbol) => format!("TO_FAR_PTR_T({})", symbol),
        None => NULL_FAR_PTR.to_string(),
    }
}

fn emit(
    files: &mut ArtifactSet,
    symbol: &str,
    declaration: &str,
    source: Source,
) -> Result<()> {
    files.insert(format!("{}.c", symbol), source.finish())?;
    files.insert(format!("{}.h", symbol), data_header(symbol, declaration))
}

fn emit_bytes(files: &mut ArtifactSet, symbol: &str, title: &str, data: &[u8]) -> Result<()> {
    let mut src = banked_source(title, &[symbol], &[]);
    src.line(format!("const unsigned char {}[] = {{", symbol));
    for row in byte_rows(data) {
        src.line(row);
    }
    src.line("};");
    emit(files, symbol, &format!("const unsigned char {}[]", symbol), src)
}

fn emit_tileset(files: &mut ArtifactSet, symbol: &str, title: &str, data: &[u8]) -> Result<()> {
    let mut src = banked_source(title, &[symbol], &[]);
    src.line(format!("const tileset_t {} = {{", symbol))
        .line(format!("    .n_tiles = {},", data.len() / TILE_SIZE))
        .line("    .tiles = {");
    for row in byte_rows(data) {
        src.line(format!("    {}", row));
    }
    src.line("    }").line("};");
    emit(files, symbol, &format!("const tileset_t {}", symbol), src)
}

fn emit_tilesets(files: &mut ArtifactSet, tilesets: &[PrecompiledTileset], title: &str) -> Result<()> {
    for tileset in tilesets {
        emit_tileset(files, &tileset.symbol, title, &tileset.data)?;
    }
    Ok(())
}

fn dmg_shade(name: &str) -> u8 {
    match name {
        "DMG_WHITE" => 0,
        "DMG_LITE_GRAY" => 1,
        "DMG_DARK_GRAY" => 2,
        _ => 3,
    }
}

/// `RRGGBB` to a 15 bit BGR color.
fn rgb555(hex: &str) -> u16 {
    let channel = |i: usize| {
        hex.get(i..i + 2)
            .and_then(|c| u8::from_str_radix(c, 16).ok())
            .unwrap_or(0) as u16
    };
    (channel(0) >> 3) | ((channel(2) >> 3) << 5) | ((channel(4) >> 3) << 10)
}

fn emit_palette(files: &mut ArtifactSet, palette: &PrecompiledPalette) -> Result<()> {
    let symbol = palette.symbol.as_str();
    let mut src = banked_source("Palette", &[symbol], &[]);
    let dmg: Vec<String> = (0..2)
        .map(|i| {
            let value = palette.dmg.get(i).map_or(0, |row| {
                row.iter()
                    .enumerate()
                    .fold(0u8, |acc, (n, shade)| acc | (dmg_shade(shade) << (n * 2)))
            });
            format!("0x{:02X}", value)
        })
        .collect();
    let mask = if palette.colors.is_some() { 0xFF } else { 0x00 };
    src.line(format!("const palette_t {} = {{", symbol))
        .line(format!("    .mask = 0x{:02X},", mask))
        .line(format!("    .palette = {{ {} }},", dmg.join(", ")))
        .line("    .cgb_palette = {");
    for slot in palette.colors.iter().flatten() {
        let colors: Vec<String> = slot.iter().map(|c| format!("0x{:04X}", rgb555(c))).collect();
        src.line(format!("        {{ {} }},", colors.join(", ")));
    }
    src.line("    }").line("};");
    emit(files, symbol, &format!("const palette_t {}", symbol), src)
}

fn emit_font(files: &mut ArtifactSet, symbol: &str, title: &str, data: &[u8]) -> Result<()> {
    let bitmaps = format!("{}_bitmaps", symbol);
    let mut src = banked_source(title, &[symbol, bitmaps.as_str()], &[]);
    src.line(format!("const unsigned char {}[] = {{", bitmaps));
    for row in byte_rows(data) {
        src.line(row);
    }
    src.line("};")
        .blank()
        .line(format!("const font_t {} = {{", symbol))
        .line("    .attr = 0,")
        .line(format!("    .bitmaps = TO_FAR_PTR_T({})", bitmaps))
        .line("};");
    emit(files, symbol, &format!("const font_t {}", symbol), src)
}

fn direction(dir: &str) -> &'static str {
    match dir {
        "up" => "DIR_UP",
        "left" => "DIR_LEFT",
        "right" => "DIR_RIGHT",
        _ => "DIR_DOWN",
    }
}

fn collision_group(group: &str) -> u8 {
    match group {
        "player" => 0x01,
        "1" => 0x02,
        "2" => 0x04,
        "3" => 0x08,
        _ => 0x00,
    }
}

struct SceneSources<'a> {
    input: &'a CodegenInput<'a>,
    scene: &'a PrecompiledScene,
    scripts: &'a SceneScripts,
}

impl SceneSources<'_> {
    fn sprite_symbol(&self, id: &str) -> Option<&str> {
        self.input
            .precompiled
            .sprites
            .get(id)
            .map(|s| s.symbol.as_str())
    }

    fn actors(&self, files: &mut ArtifactSet) -> Result<Option<String>> {
        if self.scene.actors.is_empty() {
            return Ok(None);
        }
        let symbol = format!("{}_actors", self.scene.symbol);
        let mut headers: Vec<&str> = Vec::new();
        for (i, actor) in self.scene.actors.iter().enumerate() {
            headers.extend(self.sprite_symbol(&actor.actor.sprite_sheet_id));
            headers.extend(self.scripts.actors.get(i).and_then(|s| s.as_deref()));
            headers.extend(self.scripts.actor_updates.get(i).and_then(|s| s.as_deref()));
        }
        headers.dedup();
        let mut src = banked_source(&format!("Scene {} actors", self.scene.name), &[symbol.as_str()], &headers);
        src.line(format!("const actor_t {}[] = {{", symbol));
        for (i, actor) in self.scene.actors.iter().enumerate() {
            self.actor(&mut src, &actor.actor, i);
        }
        src.line("};");
        emit(files, &symbol, &format!("const actor_t {}[]", symbol), src)?;
        Ok(Some(symbol))
    }

    fn actor(&self, src: &mut Source, actor: &Actor, i: usize) {
        let script = self.scripts.actors.get(i).and_then(|s| s.as_deref());
        let update = self.scripts.actor_updates.get(i).and_then(|s| s.as_deref());
        src.line("    {")
            .line(format!("        // {}", if actor.name.is_empty() { &actor.id } else { &actor.name }))
            .line(format!("        .x = {},", actor.x.max(0) * 16))
            .line(format!("        .y = {},", actor.y.max(0) * 16))
            .line(format!("        .dir = {},", direction(&actor.direction)))
            .line(format!(
                "        .sprite = {},",
                far_ptr(self.sprite_symbol(&actor.sprite_sheet_id))
            ))
            .line(format!(
                "        .collision_group = 0x{:02X},",
                collision_group(&actor.collision_group)
            ))
            .line(format!("        .script = {},", far_ptr(script)))
            .line(format!("        .script_update = {}", far_ptr(update)))
            .line("    },");
    }

    fn triggers(&self, files: &mut ArtifactSet) -> Result<Option<String>> {
        if self.scene.triggers.is_empty() {
            return Ok(None);
        }
        let symbol = format!("{}_triggers", self.scene.symbol);
        let headers: Vec<&str> = self
            .scripts
            .triggers
            .iter()
            .filter_map(|s| s.as_deref())
            .collect();
        let mut src = banked_source(&format!("Scene {} triggers", self.scene.name), &[symbol.as_str()], &headers);
        src.line(format!("const trigger_t {}[] = {{", symbol));
        for (i, trigger) in self.scene.triggers.iter().enumerate() {
            let t = &trigger.trigger;
            let script = self.scripts.triggers.get(i).and_then(|s| s.as_deref());
            src.line("    {")
                .line(format!(
                    "        .x = {}, .y = {}, .width = {}, .height = {},",
                    t.x.max(0),
                    t.y.max(0),
                    t.width,
                    t.height
                ))
                .line(format!("        .script = {}", far_ptr(script)))
                .line("    },");
        }
        src.line("};");
        emit(files, &symbol, &format!("const trigger_t {}[]", symbol), src)?;
        Ok(Some(symbol))
    }

    fn sprites(&self, files: &mut ArtifactSet) -> Result<Option<String>> {
        let sprites: Vec<&str> = self
            .scene
            .sprites
            .iter()
            .filter_map(|id| self.sprite_symbol(id))
            .collect();
        if sprites.is_empty() {
            return Ok(None);
        }
        let symbol = format!("{}_sprites", self.scene.symbol);
        let mut src = banked_source(&format!("Scene {} sprites", self.scene.name), &[symbol.as_str()], &sprites);
        src.line(format!("const far_ptr_t {}[] = {{", symbol));
        for sprite in &sprites {
            src.line(format!("    TO_FAR_PTR_T({}),", sprite));
        }
        src.line("};");
        emit(files, &symbol, &format!("const far_ptr_t {}[]", symbol), src)?;
        Ok(Some(symbol))
    }

    fn projectiles(&self, files: &mut ArtifactSet) -> Result<Option<String>> {
        if self.scene.projectiles.is_empty() {
            return Ok(None);
        }
        let symbol = format!("{}_projectiles", self.scene.symbol);
        let headers: Vec<&str> = self
            .scene
            .projectiles
            .iter()
            .filter_map(|p| self.sprite_symbol(&p.sprite_sheet_id))
            .collect();
        let mut src = banked_source(
            &format!("Scene {} projectiles", self.scene.name),
            &[symbol.as_str()],
            &headers,
        );
        src.line(format!("const projectile_def_t {}[] = {{", symbol));
        for projectile in &self.scene.projectiles {
            let number = |key: &str, default: u64| {
                projectile
                    .args
                    .get(key)
                    .and_then(serde_json::Value::as_f64)
                    .map_or(default, |v| v.max(0.0) as u64)
            };
            let group = projectile
                .args
                .get("collisionGroup")
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default();
            let mask: u8 = projectile
                .args
                .get("collisionMask")
                .and_then(serde_json::Value::as_array)
                .map_or(0, |groups| {
                    groups
                        .iter()
                        .filter_map(serde_json::Value::as_str)
                        .fold(0, |acc, g| acc | collision_group(g))
                });
            src.line("    {")
                .line(format!(
                    "        .sprite = {},",
                    far_ptr(self.sprite_symbol(&projectile.sprite_sheet_id))
                ))
                .line(format!("        .move_speed = {},", number("speed", 2).min(255)))
                .line(format!("        .life_time = {},", number("lifeTime", 1) * 60))
                .line(format!("        .collision_group = 0x{:02X},", collision_group(group)))
                .line(format!("        .collision_mask = 0x{:02X}", mask))
                .line("    },");
        }
        src.line("};");
        emit(files, &symbol, &format!("const projectile_def_t {}[]", symbol), src)?;
        Ok(Some(symbol))
    }

    fn collisions(&self, files: &mut ArtifactSet) -> Result<String> {
        let source = &self.scene.scene;
        let size = (source.width * source.height) as usize;
        let mut data = source.collisions.clone();
        data.resize(size, 0);
        let symbol = format!("{}_collisions", self.scene.symbol);
        emit_bytes(files, &symbol, &format!("Scene {} collisions", self.scene.name), &data)?;
        Ok(symbol)
    }

    fn emit(&self, files: &mut ArtifactSet) -> Result<()> {
        let precompiled = self.input.precompiled;
        let scene = self.scene;
        let source = &scene.scene;

        let collisions = self.collisions(files)?;
        let actors = self.actors(files)?;
        let triggers = self.triggers(files)?;
        let sprites = self.sprites(files)?;
        let projectiles = self.projectiles(files)?;

        let background = &precompiled.backgrounds.backgrounds[scene.background];
        let palettes = &precompiled.palettes;
        let palette = palettes
            .scene_background
            .get(&source.id)
            .map(|&i| palettes.palettes[i].symbol.as_str());
        let sprite_palette = palettes
            .scene_sprites
            .get(&source.id)
            .map(|&i| palettes.palettes[i].symbol.as_str());
        let player_sprite = scene.player_sprite.as_deref().and_then(|id| self.sprite_symbol(id));
        let scene_type = self
            .input
            .used_scene_types
            .iter()
            .position(|t| *t == source.scene_type)
            .unwrap_or(0);

        let mut headers: Vec<&str> = vec![background.symbol.as_str(), collisions.as_str()];
        headers.extend(palette);
        headers.extend(sprite_palette);
        headers.extend(player_sprite);
        for symbol in [&actors, &triggers, &sprites, &projectiles] {
            headers.extend(symbol.as_deref());
        }
        headers.extend(self.scripts.init.as_deref());
        headers.extend(self.scripts.player_hit.as_deref());
        headers.dedup();

        let symbol = scene.symbol.as_str();
        let mut src = banked_source(&format!("Scene: {}", scene.name), &[symbol], &headers);
        src.line(format!("const scene_t {} = {{", symbol))
            .line(format!("    .width = {},", source.width))
            .line(format!("    .height = {},", source.height))
            .line(format!("    .type = {},", scene_type))
            .line(format!("    .parallax = {},", u8::from(source.parallax)))
            .line(format!("    .background = TO_FAR_PTR_T({}),", background.symbol))
            .line(format!("    .collisions = TO_FAR_PTR_T({}),", collisions))
            .line(format!("    .palette = {},", far_ptr(palette)))
            .line(format!("    .sprite_palette = {},", far_ptr(sprite_palette)))
            .line(format!("    .player_sprite = {},", far_ptr(player_sprite)))
            .line(format!("    .n_actors = {},", scene.actors.len()))
            .line(format!("    .n_triggers = {},", scene.triggers.len()))
            .line(format!(
                "    .n_sprites = {},",
                sprites.as_ref().map_or(0, |_| scene.sprites.len())
            ))
            .line(format!("    .n_projectiles = {},", scene.projectiles.len()))
            .line(format!("    .actors = {},", far_ptr(actors.as_deref())))
            .line(format!("    .triggers = {},", far_ptr(triggers.as_deref())))
            .line(format!("    .sprites = {},", far_ptr(sprites.as_deref())))
            .line(format!("    .projectiles = {},", far_ptr(projectiles.as_deref())))
            .line(format!("    .script_init = {},", far_ptr(self.scripts.init.as_deref())))
            .line(format!(
                "    .script_p_hit1 = {}",
                far_ptr(self.scripts.player_hit.as_deref())
            ))
            .line("};");
        emit(files, symbol, &format!("const scene_t {}", symbol), src)
    }
}

fn emit_background(
    files: &mut ArtifactSet,
    background: &crate::precompile::PrecompiledBackground,
) -> Result<()> {
    let symbol = background.symbol.as_str();
    let headers: Vec<&str> = [
        background.tileset.as_deref(),
        background.cgb_tileset.as_deref(),
        background.tilemap.as_deref(),
        background.tilemap_attr.as_deref(),
    ]
    .into_iter()
    .flatten()
    .collect();
    let mut src = banked_source(&format!("Background: {}", background.name), &[symbol], &headers);
    src.line(format!("const background_t {} = {{", symbol))
        .line(format!("    .width = {},", background.width))
        .line(format!("    .height = {},", background.height))
        .line(format!("    .tileset = {},", far_ptr(background.tileset.as_deref())))
        .line(format!("    .cgb_tileset = {},", far_ptr(background.cgb_tileset.as_deref())))
        .line(format!("    .tilemap = {},", far_ptr(background.tilemap.as_deref())))
        .line(format!(
            "    .cgb_tilemap_attr = {}",
            far_ptr(background.tilemap_attr.as_deref())
        ))
        .line("};");
    emit(files, symbol, &format!("const background_t {}", symbol), src)
}

fn emit_sprite(files: &mut ArtifactSet, sprite: &crate::precompile::PrecompiledSprite) -> Result<()> {
    let symbol = sprite.symbol.as_str();
    let mut headers = vec![sprite.tileset.as_str()];
    headers.extend(sprite.bank2_tileset.as_deref());
    let mut src = banked_source(&format!("Sprite: {}", sprite.name), &[symbol], &headers);
    src.line(format!("const spritesheet_t {} = {{", symbol))
        .line(format!("    .n_metasprites = {},", sprite.num_tiles.min(255)))
        .line(format!("    .tileset = TO_FAR_PTR_T({}),", sprite.tileset))
        .line(format!("    .cgb_tileset = {}", far_ptr(sprite.bank2_tileset.as_deref())))
        .line("};");
    emit(files, symbol, &format!("const spritesheet_t {}", symbol), src)
}

fn emit_spritesheet_none(files: &mut ArtifactSet) -> Result<()> {
    let symbol = "spritesheet_none";
    let mut src = banked_source("Empty sprite", &[symbol], &[]);
    src.line(format!("const spritesheet_t {} = {{", symbol))
        .line("    .n_metasprites = 0,")
        .line(format!("    .tileset = {},", NULL_FAR_PTR))
        .line(format!("    .cgb_tileset = {}", NULL_FAR_PTR))
        .line("};");
    emit(files, symbol, &format!("const spritesheet_t {}", symbol), src)
}

fn emit_avatar_fonts(files: &mut ArtifactSet, avatars: &[PrecompiledAsset]) -> Result<usize> {
    let mut count = 0;
    for (n, chunk) in avatars.chunks(AVATARS_PER_FONT).enumerate() {
        let data: Vec<u8> = chunk.iter().flat_map(|a| a.data.iter().copied()).collect();
        emit_font(files, &format!("avatar_font_{}", n), "Avatar font", &data)?;
        count += 1;
    }
    Ok(count)
}

fn emit_music(files: &mut ArtifactSet, music: &[PrecompiledAsset]) -> Result<()> {
    for track in music {
        emit_bytes(files, &track.symbol, &format!("Music: {}", track.name), &track.data)?;
    }
    let mut header = Source::default();
    header
        .line("#ifndef MUSIC_DATA_H")
        .line("#define MUSIC_DATA_H")
        .blank()
        .line("#include \"gbs_types.h\"")
        .line("#include \"bankdata.h\"")
        .blank();
    for track in music {
        header.line(format!("#include \"data/{}.h\"", track.symbol));
    }
    header
        .blank()
        .line(format!("#define MUSIC_TRACK_COUNT {}", music.len()))
        .blank()
        .line("#endif");
    files.insert("music_data.h", header.finish())
}

fn emit_sounds(files: &mut ArtifactSet, sounds: &[PrecompiledAsset]) -> Result<()> {
    for sound in sounds {
        let symbol = sound.symbol.as_str();
        let mut src = banked_source(&format!("Sound: {}", sound.name), &[symbol], &[]);
        src.line(format!("const unsigned char {}[] = {{", symbol));
        for row in byte_rows(&sound.data) {
            src.line(row);
        }
        src.line("};");
        files.insert(format!("sounds/{}.c", symbol), src.finish())?;
        files.insert(
            format!("sounds/{}.h", symbol),
            data_header(symbol, &format!("const unsigned char {}[]", symbol)),
        )?;
    }
    Ok(())
}

/// `VAR_<SYMBOL>` per referenced variable, unique and in first-use order.
pub fn variable_aliases(project: &ProjectResources, used: &[String]) -> IndexMap<String, String> {
    let mut names = SymbolAllocator::new();
    used.iter()
        .map(|id| {
            let symbol = project
                .variables
                .variables
                .iter()
                .find(|v| v.id == *id)
                .map(|v| v.symbol.as_str())
                .unwrap_or_default();
            let preferred = if symbol.is_empty() {
                String::new()
            } else {
                format!("var_{}", symbol)
            };
            let alias = names
                .allocate(&preferred, &format!("var_variable_{}", id))
                .to_uppercase();
            (id.clone(), alias)
        })
        .collect()
}

fn emit_globals(files: &mut ArtifactSet, input: &CodegenInput<'_>) -> Result<()> {
    let mut asm = Source::default();
    let mut c = Source::default();
    c.line("#ifndef GAME_GLOBALS_H").line("#define GAME_GLOBALS_H").blank();
    for (index, alias) in input.variables.values().enumerate() {
        asm.line(format!("{} = {}", alias, index));
        c.line(format!("#define {} {}", alias, index));
    }
    let mut constants = SymbolAllocator::new();
    for constant in &input.project.variables.constants {
        let name = constants
            .allocate(&constant.symbol, &format!("constant_{}", constant.id))
            .to_uppercase();
        asm.line(format!("{} = {}", name, constant.value));
        c.line(format!("#define {} {}", name, constant.value));
    }
    asm.line(format!("MAX_GLOBAL_VARS = {}", input.variables.len()));
    c.line(format!("#define MAX_GLOBAL_VARS {}", input.variables.len()))
        .blank()
        .line("#endif");
    files.insert("game_globals.i", asm.finish())?;
    files.insert("game_globals.h", c.finish())
}

fn emit_scene_types(files: &mut ArtifactSet, input: &CodegenInput<'_>) -> Result<()> {
    let mut src = Source::default();
    src.line("#ifndef SCENE_TYPES_H").line("#define SCENE_TYPES_H").blank();
    for (index, key) in input.used_scene_types.iter().enumerate() {
        let label = input
            .engine_scene_types
            .iter()
            .find(|t| t.key == *key)
            .map_or(key.as_str(), |t| t.label.as_str());
        src.line(format!("// {}", label));
        src.line(format!("#define SCENE_TYPE_{} {}", crate::symbols::to_c_identifier(key).to_uppercase(), index));
    }
    src.line(format!("#define SCENE_TYPE_COUNT {}", input.used_scene_types.len()))
        .blank()
        .line("#endif");
    files.insert("scene_types.h", src.finish())
}

fn emit_bootstrap(files: &mut ArtifactSet, input: &CodegenInput<'_>) -> Result<()> {
    let settings = &input.project.settings;
    let precompiled = input.precompiled;
    let start = precompiled
        .scenes
        .iter()
        .find(|s| s.scene.id == settings.start_scene_id)
        .or_else(|| precompiled.scenes.first());
    let font = precompiled
        .fonts
        .iter()
        .find(|f| f.id == settings.default_font_id)
        .or_else(|| precompiled.fonts.first());

    let mut src = Source::default();
    src.line("#ifndef DATA_BOOTSTRAP_H")
        .line("#define DATA_BOOTSTRAP_H")
        .blank()
        .line("#include \"gbs_types.h\"")
        .line("#include \"bankdata.h\"")
        .line("#include \"data/game_globals.h\"")
        .line("#include \"data/scene_types.h\"");
    if let Some(scene) = start {
        src.line(format!("#include \"data/{}.h\"", scene.symbol));
    }
    if let Some(font) = font {
        src.line(format!("#include \"data/{}.h\"", font.symbol));
    }
    src.line("#include \"data/frame_image.h\"")
        .line("#include \"data/cursor_image.h\"")
        .line("#include \"data/spritesheet_none.h\"")
        .blank()
        .line(format!(
            "#define START_SCENE {}",
            far_ptr(start.map(|s| s.symbol.as_str()))
        ))
        .line(format!("#define START_SCENE_X {}", settings.start_x.max(0) * 16))
        .line(format!("#define START_SCENE_Y {}", settings.start_y.max(0) * 16))
        .line(format!("#define START_SCENE_DIR {}", direction(&settings.start_direction)))
        .line(format!(
            "#define START_PLAYER_MOVE_SPEED {}",
            (settings.start_move_speed * 16.0).round() as i32
        ))
        .line(format!("#define START_PLAYER_ANIM_TICK {}", settings.start_anim_speed))
        .line(format!(
            "#define UI_FONT {}",
            far_ptr(font.map(|f| f.symbol.as_str()))
        ))
        .blank()
        .line("static inline void bootstrap_init(void) {}")
        .blank()
        .line("#endif");
    files.insert("data_bootstrap.h", src.finish())
}

fn emit_engine_init(files: &mut ArtifactSet) -> Result<()> {
    let symbol = "script_engine_init";
    let mut src = Source::default();
    src.line(format!(".module {}", symbol))
        .blank()
        .line(".include \"vm.i\"")
        .line(".include \"data/game_globals.i\"")
        .blank()
        .line(".area _CODE_255")
        .blank()
        .line(format!("___bank_{} = 255", symbol))
        .line(format!(".globl ___bank_{}", symbol))
        .blank()
        .line(format!("_{}::", symbol))
        .line("        VM_STOP");
    files.insert(format!("{}.s", symbol), src.finish())?;
    files.insert(format!("{}.h", symbol), crate::script::script_header(symbol))
}

/// Save data is only valid for the build that wrote it; the signature changes
/// with the variable layout and the project content.
fn emit_signature(files: &mut ArtifactSet, input: &CodegenInput<'_>) -> Result<()> {
    let mut bytes = serde_json::to_vec(input.project)?;
    for alias in input.variables.values() {
        bytes.extend_from_slice(alias.as_bytes());
    }
    let key = hash_bytes("game-signature", &bytes);
    let signature: Vec<String> = key.bytes(8).iter().map(|b| format!("0x{:02X}", b)).collect();
    let mut src = Source::default();
    src.line("#pragma bank 255")
        .blank()
        .line("#include \"gbs_types.h\"")
        .blank()
        .line(format!("const UBYTE game_signature[] = {{ {} }};", signature.join(", ")));
    files.insert("game_signature.c", src.finish())
}

/// Renders every data table into `files`.
pub fn generate_data_files(input: &CodegenInput<'_>, files: &mut ArtifactSet) -> Result<()> {
    let precompiled = input.precompiled;

    emit_tilesets(files, &precompiled.backgrounds.tilesets, "Background tileset")?;
    emit_tilesets(files, &precompiled.sprites.tilesets, "Sprite tileset")?;
    for tileset in &precompiled.tilesets {
        emit_tileset(files, &tileset.symbol, &format!("Tileset: {}", tileset.name), &tileset.data)?;
    }
    for tilemap in &precompiled.backgrounds.tilemaps {
        emit_bytes(files, &tilemap.symbol, "Tilemap", &tilemap.data)?;
    }
    for attr in &precompiled.backgrounds.tilemap_attrs {
        emit_bytes(files, &attr.symbol, "Tilemap attributes", &attr.data)?;
    }
    for background in &precompiled.backgrounds.backgrounds {
        emit_background(files, background)?;
    }
    for palette in &precompiled.palettes.palettes {
        emit_palette(files, palette)?;
    }
    for sprite in &precompiled.sprites.sprites {
        emit_sprite(files, sprite)?;
    }
    emit_spritesheet_none(files)?;
    for font in &precompiled.fonts {
        emit_font(files, &font.symbol, &format!("Font: {}", font.name), &font.data)?;
    }
    emit_avatar_fonts(files, &precompiled.avatars)?;
    for emote in &precompiled.emotes {
        emit_tileset(files, &emote.symbol, &format!("Emote: {}", emote.name), &emote.data)?;
    }
    emit_tileset(files, "frame_image", "UI frame", &precompiled.ui.frame)?;
    emit_tileset(files, "cursor_image", "UI cursor", &precompiled.ui.cursor)?;

    for (scene, scripts) in precompiled.scenes.iter().zip(input.scene_scripts) {
        SceneSources { input, scene, scripts }.emit(files)?;
    }

    emit_music(files, &precompiled.music)?;
    emit_sounds(files, &precompiled.sounds)?;
    emit_globals(files, input)?;
    emit_scene_types(files, input)?;
    emit_bootstrap(files, input)?;
    emit_engine_init(files)?;
    emit_signature(files, input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::Variable;

    #[test]
    fn variable_aliases_prefer_symbols_and_stay_unique() {
        let mut project = ProjectResources::default();
        project.variables.variables = vec![
            Variable {
                id: "0".into(),
                name: "Score".into(),
                symbol: "score".into(),
            },
            Variable {
                id: "1".into(),
                name: "Score 2".into(),
                symbol: "score".into(),
            },
        ];
        let aliases = variable_aliases(&project, &["0".into(), "1".into(), "7".into()]);
        let values: Vec<&str> = aliases.values().map(String::as_str).collect();
        assert_eq!(values, vec!["VAR_SCORE", "VAR_SCORE_1", "VAR_VARIABLE_7"]);
    }

    #[test]
    fn colors_pack_to_fifteen_bits() {
        assert_eq!(rgb555("FFFFFF"), 0x7FFF);
        assert_eq!(rgb555("000000"), 0);
        assert_eq!(rgb555("FF0000"), 0x001F);
        assert_eq!(rgb555("zz"), 0);
    }

    #[test]
    fn tilesets_count_whole_tiles() {
        let mut files = ArtifactSet::new();
        emit_tileset(&mut files, "bg_tileset", "t", &[0u8; TILE_SIZE * 3]).unwrap();
        let source = files.get("bg_tileset.c").unwrap();
        assert!(source.contains(".n_tiles = 3,"));
        assert!(source.contains("BANKREF(bg_tileset)"));
        let header = files.get("bg_tileset.h").unwrap();
        assert!(header.contains("extern const tileset_t bg_tileset;"));
    }

    #[test]
    fn dmg_rows_pack_shades() {
        let mut files = ArtifactSet::new();
        let palette = PrecompiledPalette {
            symbol: "palette_0".into(),
            dmg: vec![["DMG_WHITE", "DMG_LITE_GRAY", "DMG_DARK_GRAY", "DMG_BLACK"]],
            colors: None,
        };
        emit_palette(&mut files, &palette).unwrap();
        let source = files.get("palette_0.c").unwrap();
        assert!(source.contains(".palette = { 0xE4, 0x00 },"));
        assert!(source.contains(".mask = 0x00,"));
    }
}
