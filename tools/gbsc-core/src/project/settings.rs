use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::hash::{StableHash, StableHasher};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectMetadata {
    pub name: String,
    pub author: String,
    pub notes: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    #[default]
    Mono,
    Mixed,
    Color,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CartType {
    Mbc3,
    #[default]
    Mbc5,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MusicDriver {
    #[default]
    #[serde(rename = "gbtplayer")]
    GbtPlayer,
    #[serde(rename = "huge")]
    Huge,
}

impl MusicDriver {
    /// Preprocessor symbol and source directory name of the driver.
    pub fn define(self) -> &'static str {
        match self {
            MusicDriver::GbtPlayer => "GBT_PLAYER",
            MusicDriver::Huge => "HUGE_TRACKER",
        }
    }

    /// Source directory marker of the driver that is not in use.
    pub fn inactive_define(self) -> &'static str {
        match self {
            MusicDriver::GbtPlayer => "HUGE_TRACKER",
            MusicDriver::Huge => "GBT_PLAYER",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpriteMode {
    #[serde(rename = "8x8")]
    Mode8x8,
    #[default]
    #[serde(rename = "8x16")]
    Mode8x16,
}

impl SpriteMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SpriteMode::Mode8x8 => "8x8",
            SpriteMode::Mode8x16 => "8x16",
        }
    }
}

impl StableHash for SpriteMode {
    fn stable_hash(&self, hasher: &mut StableHasher) {
        hasher.str(self.as_str());
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorCorrection {
    #[default]
    Default,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub color_mode: ColorMode,
    pub sgb_enabled: bool,
    pub cart_type: CartType,
    pub music_driver: MusicDriver,
    pub batteryless_enabled: bool,
    pub compiler_preset: u32,
    pub sprite_mode: SpriteMode,
    pub default_background_palette_ids: Vec<String>,
    pub default_sprite_palette_ids: Vec<String>,
    /// Scene type to default player sprite sheet id.
    pub default_player_sprites: BTreeMap<String, String>,
    pub default_font_id: String,
    pub start_scene_id: String,
    pub start_x: i32,
    pub start_y: i32,
    pub start_direction: String,
    pub start_move_speed: f32,
    pub start_anim_speed: u32,
    pub rom_filename: String,
    pub debugger_enabled: bool,
    pub color_correction: ColorCorrection,
    pub custom_head: String,
    pub custom_colors_black: String,
    pub custom_controls_up: Vec<String>,
    pub custom_controls_down: Vec<String>,
    pub custom_controls_left: Vec<String>,
    pub custom_controls_right: Vec<String>,
    pub custom_controls_a: Vec<String>,
    pub custom_controls_b: Vec<String>,
    pub custom_controls_start: Vec<String>,
    pub custom_controls_select: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            color_mode: ColorMode::Mono,
            sgb_enabled: false,
            cart_type: CartType::Mbc5,
            music_driver: MusicDriver::GbtPlayer,
            batteryless_enabled: false,
            compiler_preset: 3000,
            sprite_mode: SpriteMode::Mode8x16,
            default_background_palette_ids: Vec::new(),
            default_sprite_palette_ids: Vec::new(),
            default_player_sprites: BTreeMap::new(),
            default_font_id: String::new(),
            start_scene_id: String::new(),
            start_x: 0,
            start_y: 0,
            start_direction: "down".to_string(),
            start_move_speed: 1.0,
            start_anim_speed: 15,
            rom_filename: String::new(),
            debugger_enabled: false,
            color_correction: ColorCorrection::Default,
            custom_head: String::new(),
            custom_colors_black: "081820".to_string(),
            custom_controls_up: vec!["ArrowUp".into(), "w".into()],
            custom_controls_down: vec!["ArrowDown".into(), "s".into()],
            custom_controls_left: vec!["ArrowLeft".into(), "a".into()],
            custom_controls_right: vec!["ArrowRight".into(), "d".into()],
            custom_controls_a: vec!["Alt".into(), "z".into(), "j".into()],
            custom_controls_b: vec!["Control".into(), "k".into(), "x".into()],
            custom_controls_start: vec!["Enter".into()],
            custom_controls_select: vec!["Shift".into()],
        }
    }
}

impl Settings {
    /// Palette data is emitted for color hardware or Super Game Boy borders.
    pub fn uses_color_palettes(&self) -> bool {
        self.color_mode != ColorMode::Mono || self.sgb_enabled
    }

    pub fn sgb_active(&self) -> bool {
        self.sgb_enabled && self.color_mode != ColorMode::Color
    }
}
