use serde::{Deserialize, Serialize};

use super::event::ScriptEvent;
use super::settings::SpriteMode;

fn default_scene_type() -> String {
    "TOPDOWN".to_string()
}

fn default_auto_fade_speed() -> Option<u8> {
    Some(1)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Scene {
    pub id: String,
    pub name: String,
    pub symbol: String,
    #[serde(rename = "type")]
    pub scene_type: String,
    pub background_id: String,
    pub tileset_id: String,
    pub palette_ids: Vec<String>,
    pub sprite_palette_ids: Vec<String>,
    pub parallax: bool,
    pub sprite_mode: Option<SpriteMode>,
    /// `null` in the project file opts the scene out of the automatic fade-in.
    #[serde(default = "default_auto_fade_speed")]
    pub auto_fade_speed: Option<u8>,
    pub player_sprite_sheet_id: String,
    pub width: u32,
    pub height: u32,
    pub collisions: Vec<u8>,
    pub actors: Vec<Actor>,
    pub triggers: Vec<Trigger>,
    pub script: Vec<ScriptEvent>,
    pub player_hit1_script: Vec<ScriptEvent>,
    pub player_hit2_script: Vec<ScriptEvent>,
    pub player_hit3_script: Vec<ScriptEvent>,
}

impl Default for Scene {
    fn default() -> Self {
        Scene {
            id: String::new(),
            name: String::new(),
            symbol: String::new(),
            scene_type: default_scene_type(),
            background_id: String::new(),
            tileset_id: String::new(),
            palette_ids: Vec::new(),
            sprite_palette_ids: Vec::new(),
            parallax: false,
            sprite_mode: None,
            auto_fade_speed: default_auto_fade_speed(),
            player_sprite_sheet_id: String::new(),
            width: 20,
            height: 18,
            collisions: Vec::new(),
            actors: Vec::new(),
            triggers: Vec::new(),
            script: Vec::new(),
            player_hit1_script: Vec::new(),
            player_hit2_script: Vec::new(),
            player_hit3_script: Vec::new(),
        }
    }
}

impl Scene {
    /// Display name used in warnings.
    pub fn display_name(&self, index: usize) -> String {
        if self.name.is_empty() {
            format!("Scene {}", index + 1)
        } else {
            self.name.clone()
        }
    }

    /// Script slots keyed by their project field name.
    pub fn scripts(&self) -> [(&'static str, &[ScriptEvent]); 4] {
        [
            ("script", self.script.as_slice()),
            ("playerHit1Script", self.player_hit1_script.as_slice()),
            ("playerHit2Script", self.player_hit2_script.as_slice()),
            ("playerHit3Script", self.player_hit3_script.as_slice()),
        ]
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Actor {
    pub id: String,
    pub name: String,
    pub symbol: String,
    pub sprite_sheet_id: String,
    pub x: i32,
    pub y: i32,
    pub direction: String,
    pub collision_group: String,
    pub script: Vec<ScriptEvent>,
    pub start_script: Vec<ScriptEvent>,
    pub update_script: Vec<ScriptEvent>,
    pub hit1_script: Vec<ScriptEvent>,
    pub hit2_script: Vec<ScriptEvent>,
    pub hit3_script: Vec<ScriptEvent>,
}

impl Actor {
    pub fn scripts(&self) -> [(&'static str, &[ScriptEvent]); 6] {
        [
            ("script", self.script.as_slice()),
            ("startScript", self.start_script.as_slice()),
            ("updateScript", self.update_script.as_slice()),
            ("hit1Script", self.hit1_script.as_slice()),
            ("hit2Script", self.hit2_script.as_slice()),
            ("hit3Script", self.hit3_script.as_slice()),
        ]
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Trigger {
    pub id: String,
    pub name: String,
    pub symbol: String,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub script: Vec<ScriptEvent>,
    pub leave_script: Vec<ScriptEvent>,
}

impl Trigger {
    pub fn scripts(&self) -> [(&'static str, &[ScriptEvent]); 2] {
        [("script", self.script.as_slice()), ("leaveScript", self.leave_script.as_slice())]
    }

    /// A trigger whose enter and leave scripts do nothing can be dropped.
    pub fn is_inert(&self) -> bool {
        let runs = |script: &[ScriptEvent]| {
            script
                .first()
                .is_some_and(|event| event.command != super::event::commands::EVENT_END)
        };
        !runs(&self.script) && !runs(&self.leave_script)
    }
}
