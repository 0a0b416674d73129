use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::Path;

use gbsc_core::project::{CartType, ColorMode, MusicDriver, Settings};
use gbsc_core::{ContentKey, StableHasher, TargetPlatform};

use crate::make::BuildType;
use crate::toolchain::Toolchain;

/// Variables that differ between machines but never change the objects a
/// compile produces.
const UNSIGNED_VARS: [&str; 3] = ["PATH", "TMP", "TEMP"];

/// Hardware features of one build, derived from the project settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildFeatures {
    pub target: TargetPlatform,
    pub color: bool,
    pub color_only: bool,
    pub color_mode: ColorMode,
    pub sgb: bool,
    pub batteryless: bool,
    pub cart_type: CartType,
    pub music_driver: MusicDriver,
    pub compiler_preset: u32,
    pub debug: bool,
}

impl BuildFeatures {
    pub fn new(settings: &Settings, build_type: BuildType, debug: bool) -> Self {
        BuildFeatures {
            target: build_type.target(),
            color: settings.color_mode != ColorMode::Mono,
            color_only: settings.color_mode == ColorMode::Color,
            color_mode: settings.color_mode,
            sgb: settings.sgb_active(),
            // The web player has no flash cart to save to.
            batteryless: settings.batteryless_enabled && build_type != BuildType::Web,
            cart_type: settings.cart_type,
            music_driver: settings.music_driver,
            compiler_preset: settings.compiler_preset,
            debug,
        }
    }

    pub fn rumble_bit(&self) -> &'static str {
        match self.cart_type {
            CartType::Mbc3 => "0x20",
            CartType::Mbc5 => "0x08",
        }
    }
}

fn cart_name(cart: CartType) -> &'static str {
    match cart {
        CartType::Mbc3 => "mbc3",
        CartType::Mbc5 => "mbc5",
    }
}

fn color_mode_name(mode: ColorMode) -> &'static str {
    match mode {
        ColorMode::Mono => "mono",
        ColorMode::Mixed => "mixed",
        ColorMode::Color => "color",
    }
}

/// Environment handed to every toolchain process on top of the inherited one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildEnv {
    vars: BTreeMap<String, String>,
}

impl BuildEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_build(features: &BuildFeatures, toolchain: &Toolchain, tmp_dir: &Path) -> Self {
        let mut env = BuildEnv::new();
        env.set("PATH", path_with(&toolchain.bin_dir()));
        for (key, value) in toolchain.root_vars() {
            env.set(key, value);
        }
        env.set("TARGET_PLATFORM", features.target.as_env());
        env.set("CART_TYPE", cart_name(features.cart_type));
        env.set("COLOR_MODE", color_mode_name(features.color_mode));
        env.set("MUSIC_DRIVER", features.music_driver.define());
        env.set("RUMBLE_ENABLE", features.rumble_bit());
        env.set("GBDK_COMPILER_PRESET", features.compiler_preset.to_string());
        if features.color {
            env.set("COLOR", "true");
        }
        if features.sgb {
            env.set("SGB", "true");
        }
        if features.batteryless {
            env.set("BATTERYLESS", "true");
        }
        if features.debug {
            env.set("DEBUG", "true");
        }
        let tmp = tmp_dir.display().to_string();
        env.set("TMP", tmp.clone());
        env.set("TEMP", tmp);
        env
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn vars(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Digest of every variable that can change compiler output.
    pub fn signature(&self) -> ContentKey {
        let mut hasher = StableHasher::new("toolchain-env");
        for (key, value) in self.vars() {
            if UNSIGNED_VARS.contains(&key) {
                continue;
            }
            hasher.str(key).str(value);
        }
        hasher.finish()
    }
}

/// The inherited `PATH` with `bin` in front.
fn path_with(bin: &Path) -> String {
    let inherited = std::env::var_os("PATH").unwrap_or_default();
    let dirs = std::iter::once(bin.to_path_buf()).chain(std::env::split_paths(&inherited));
    let joined = std::env::join_paths(dirs).unwrap_or_else(|_| OsString::from(bin));
    joined
        .into_string()
        .unwrap_or_else(|raw| raw.to_string_lossy().into_owned())
}
