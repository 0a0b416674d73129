//! Which event arguments refer to assets, and which commands wait for the
//! scene to finish fading in.

use std::collections::{HashMap, HashSet};

/// Asset class referenced by an event argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgKind {
    Background,
    Sprite,
    Music,
    Sound,
    Font,
    Avatar,
    Emote,
    Tileset,
    Variable,
    Scene,
}

impl ArgKind {
    /// Maps the `type` of an entry in a `references` argument.
    pub fn from_reference_type(kind: &str) -> Option<ArgKind> {
        Some(match kind {
            "background" => ArgKind::Background,
            "sprite" => ArgKind::Sprite,
            "music" => ArgKind::Music,
            "sound" => ArgKind::Sound,
            "font" => ArgKind::Font,
            "avatar" => ArgKind::Avatar,
            "emote" => ArgKind::Emote,
            "tileset" => ArgKind::Tileset,
            "variable" => ArgKind::Variable,
            "scene" => ArgKind::Scene,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone)]
pub struct EventSchema {
    common: HashMap<String, ArgKind>,
    per_command: HashMap<String, HashMap<String, ArgKind>>,
    waits_for_fade: HashSet<String>,
}

impl EventSchema {
    pub fn builtin() -> Self {
        let common = [
            ("backgroundId", ArgKind::Background),
            ("spriteSheetId", ArgKind::Sprite),
            ("musicId", ArgKind::Music),
            ("soundId", ArgKind::Sound),
            ("fontId", ArgKind::Font),
            ("avatarId", ArgKind::Avatar),
            ("emoteId", ArgKind::Emote),
            ("tilesetId", ArgKind::Tileset),
            ("sceneId", ArgKind::Scene),
            ("variable", ArgKind::Variable),
            ("vectorX", ArgKind::Variable),
            ("vectorY", ArgKind::Variable),
        ]
        .into_iter()
        .map(|(key, kind)| (key.to_string(), kind))
        .collect();

        let waits_for_fade = [
            "EVENT_TEXT",
            "EVENT_CHOICE",
            "EVENT_MENU",
            "EVENT_WAIT",
            "EVENT_AWAIT_INPUT",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        EventSchema {
            common,
            per_command: HashMap::new(),
            waits_for_fade,
        }
    }

    /// Declares an asset argument that only applies to `command`.
    pub fn register_arg(&mut self, command: &str, key: &str, kind: ArgKind) {
        self.per_command
            .entry(command.to_string())
            .or_default()
            .insert(key.to_string(), kind);
    }

    pub fn register_waits_for_fade(&mut self, command: &str) {
        self.waits_for_fade.insert(command.to_string());
    }

    pub fn arg_kind(&self, command: &str, key: &str) -> Option<ArgKind> {
        if let Some(kind) = self.per_command.get(command).and_then(|args| args.get(key)) {
            return Some(*kind);
        }
        if let Some(kind) = self.common.get(key) {
            return Some(*kind);
        }
        key.starts_with("$variable").then_some(ArgKind::Variable)
    }

    pub fn waits_for_fade(&self, command: &str) -> bool {
        self.waits_for_fade.contains(command)
    }
}

impl Default for EventSchema {
    fn default() -> Self {
        Self::builtin()
    }
}
