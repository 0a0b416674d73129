use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Command names the compiler itself interprets.
pub mod commands {
    pub const EVENT_END: &str = "EVENT_END";
    pub const EVENT_CALL_CUSTOM_EVENT: &str = "EVENT_CALL_CUSTOM_EVENT";
    pub const EVENT_FADE_IN: &str = "EVENT_FADE_IN";
    pub const EVENT_MUSIC_PLAY: &str = "EVENT_MUSIC_PLAY";
    pub const EVENT_LAUNCH_PROJECTILE: &str = "EVENT_LAUNCH_PROJECTILE";
    pub const EVENT_LOAD_PROJECTILE_SLOT: &str = "EVENT_LOAD_PROJECTILE_SLOT";
    pub const EVENT_ACTOR_SET_SPRITE: &str = "EVENT_ACTOR_SET_SPRITE";
    pub const EVENT_PLAYER_SET_SPRITE: &str = "EVENT_PLAYER_SET_SPRITE";
    pub const INTERNAL_IF_PARAM: &str = "INTERNAL_IF_PARAM";
    pub const INTERNAL_SET_CONTEXT: &str = "INTERNAL_SET_CONTEXT";
    pub const INTERNAL_SET_SPRITE_MODE: &str = "INTERNAL_SET_SPRITE_MODE";
}

/// One node of a visual script graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptEvent {
    pub id: String,
    pub command: String,
    pub args: Map<String, Value>,
    /// Named branches, e.g. `true`/`false` of a conditional.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub children: BTreeMap<String, Vec<ScriptEvent>>,
}

impl ScriptEvent {
    pub fn new(command: &str) -> Self {
        ScriptEvent {
            command: command.to_string(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    pub fn with_arg(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.args.insert(key.to_string(), value.into());
        self
    }

    pub fn with_branch(mut self, name: &str, events: Vec<ScriptEvent>) -> Self {
        self.children.insert(name.to_string(), events);
        self
    }

    /// Disabled events are kept in the project but never compiled.
    pub fn is_comment(&self) -> bool {
        self.args.get("__comment").and_then(Value::as_bool) == Some(true)
    }

    pub fn arg_str(&self, key: &str) -> Option<&str> {
        self.args.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
    }
}

/// True when the script has nothing to run.
pub fn is_empty_script(events: &[ScriptEvent]) -> bool {
    events
        .iter()
        .all(|event| event.command == commands::EVENT_END || event.is_comment())
}

/// Reusable script invoked with bound arguments.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CustomEvent {
    pub id: String,
    pub name: String,
    pub symbol: String,
    pub script: Vec<ScriptEvent>,
}
