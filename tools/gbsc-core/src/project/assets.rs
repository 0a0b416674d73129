use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::settings::SpriteMode;
use crate::hash::{StableHash, StableHasher};

pub const DMG_PALETTE_ID: &str = "dmg";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Palette {
    pub id: String,
    pub name: String,
    pub colors: [String; 4],
}

impl Default for Palette {
    fn default() -> Self {
        dmg_palette()
    }
}

/// Built-in monochrome palette every lookup falls back to.
pub fn dmg_palette() -> Palette {
    Palette {
        id: DMG_PALETTE_ID.to_string(),
        name: "Default".to_string(),
        colors: [
            "E8F8E0".to_string(),
            "B0F088".to_string(),
            "509878".to_string(),
            "202850".to_string(),
        ],
    }
}

impl StableHash for Palette {
    fn stable_hash(&self, hasher: &mut StableHasher) {
        hasher.tag("palette");
        self.colors.stable_hash(hasher);
    }
}

macro_rules! file_asset {
    ($name:ident, $dir:literal { $($(#[$meta:meta])* $field:ident : $ty:ty),* $(,)? }) => {
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        #[serde(rename_all = "camelCase", default)]
        pub struct $name {
            pub id: String,
            pub name: String,
            pub symbol: String,
            pub filename: String,
            $($(#[$meta])* pub $field: $ty,)*
        }

        impl $name {
            pub fn path(&self, project_root: &Path) -> PathBuf {
                project_root.join("assets").join($dir).join(&self.filename)
            }
        }
    };
}

file_asset!(Background, "backgrounds" {
    width: u32,
    height: u32,
    auto_color: bool,
});

file_asset!(Tileset, "tilesets" {});

file_asset!(SpriteSheet, "sprites" {
    sprite_mode: Option<SpriteMode>,
});

file_asset!(Font, "fonts" {});

file_asset!(Avatar, "avatars" {});

file_asset!(Emote, "emotes" {});

file_asset!(MusicTrack, "music" {
    #[serde(rename = "type")]
    kind: String,
});

file_asset!(Sound, "sounds" {
    #[serde(rename = "type")]
    kind: String,
});

impl MusicTrack {
    /// hUGETracker modules; everything else is a GBT Player module.
    pub fn is_uge(&self) -> bool {
        self.kind == "uge"
    }
}
