use serde::{Deserialize, Serialize};

/// Custom event bodies are inlined at most this many levels deep.
pub const MAX_NESTED_SCRIPT_DEPTH: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetPlatform {
    Gb,
    Pocket,
    Gba,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformLimits {
    pub max_actors: usize,
    pub max_triggers: usize,
    pub max_projectiles: usize,
}

impl TargetPlatform {
    pub fn limits(self) -> PlatformLimits {
        match self {
            TargetPlatform::Gb | TargetPlatform::Pocket => PlatformLimits {
                max_actors: 20,
                max_triggers: 30,
                max_projectiles: 5,
            },
            TargetPlatform::Gba => PlatformLimits {
                max_actors: 16,
                max_triggers: 32,
                max_projectiles: 8,
            },
        }
    }

    pub fn is_gba(self) -> bool {
        self == TargetPlatform::Gba
    }

    /// Value of the `TARGET_PLATFORM` build variable.
    pub fn as_env(self) -> &'static str {
        match self {
            TargetPlatform::Gb => "gb",
            TargetPlatform::Pocket => "pocket",
            TargetPlatform::Gba => "gba",
        }
    }
}
