//! Project description as loaded from the JSON project file.
//!
//! The compiler treats these types as immutable input; derived data lives in
//! the precompiled structures instead.

mod assets;
mod entities;
mod event;
mod settings;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CompileError, Result};

pub use assets::{
    Avatar, Background, DMG_PALETTE_ID, Emote, Font, MusicTrack, Palette, Sound, SpriteSheet,
    Tileset, dmg_palette,
};
pub use entities::{Actor, Scene, Trigger};
pub use event::{CustomEvent, ScriptEvent, commands, is_empty_script};
pub use settings::{
    CartType, ColorCorrection, ColorMode, MusicDriver, ProjectMetadata, Settings, SpriteMode,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectResources {
    pub metadata: ProjectMetadata,
    pub settings: Settings,
    pub scenes: Vec<Scene>,
    /// Custom event scripts.
    pub scripts: Vec<CustomEvent>,
    pub variables: VariablesState,
    pub palettes: Vec<Palette>,
    pub sprites: Vec<SpriteSheet>,
    pub backgrounds: Vec<Background>,
    pub tilesets: Vec<Tileset>,
    pub fonts: Vec<Font>,
    pub avatars: Vec<Avatar>,
    pub emotes: Vec<Emote>,
    pub music: Vec<MusicTrack>,
    pub sounds: Vec<Sound>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VariablesState {
    pub variables: Vec<Variable>,
    pub constants: Vec<Constant>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Variable {
    pub id: String,
    pub name: String,
    pub symbol: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Constant {
    pub id: String,
    pub name: String,
    pub symbol: String,
    pub value: i32,
}

impl ProjectResources {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| CompileError::io_path("read project", path, e))?;
        Self::from_json(&text)
    }

    pub fn is_color_only(&self) -> bool {
        self.settings.color_mode == ColorMode::Color
    }
}
