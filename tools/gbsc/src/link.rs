//! Linking and the post-link steps of each target.

use std::fs;
use std::path::{Path, PathBuf};

use gbsc_core::TargetPlatform;
use gbsc_core::project::{CartType, MusicDriver};
use tracing::{info, warn};

use crate::commands::{CompileCommand, GBA_ARCH_FLAGS, link_manifest};
use crate::context::BuildContext;
use crate::env::{BuildEnv, BuildFeatures};
use crate::error::{BuildError, Result};
use crate::fs_util::copy_file;
use crate::rom_image::{GBA_MIN_ROM_SIZE, extract_binary, pad_rom};
use crate::spawn::{ToolCommand, run_tool};
use crate::toolchain::{DevkitProPaths, GbdkPaths, Toolchain};

const LINKFILE: &str = "obj/linkfile.lk";
const ROM_DIR: &str = "build/rom";

/// Cartridge header title: uppercase letters only, at most 15 of them.
pub fn header_name(name: &str) -> String {
    let title: String = name
        .to_uppercase()
        .chars()
        .filter(|c| c.is_ascii_uppercase())
        .take(15)
        .collect();
    if title.is_empty() {
        "GBSTUDIO".to_string()
    } else {
        title
    }
}

pub fn gb_link_args(features: &BuildFeatures, rom_filename: &str, project_name: &str) -> Vec<String> {
    let cart = match features.cart_type {
        CartType::Mbc3 => "0x10",
        CartType::Mbc5 => "0x1E",
    };
    let mut args: Vec<String> = vec![format!("-Wm-yt{}", cart)];
    args.extend(
        [
            "-autobank",
            "-Wb-ext=.rel",
            "-Wm-yoA",
            "-Wm-ya4",
            "-Wl-j",
            "-Wl-m",
            "-Wl-w",
            "-Wm-yS",
            "-Wl-klib",
            "-Wl-g.STACK=0xDF00",
            "-Wi-e",
        ]
        .map(String::from),
    );
    args.push(format!("-Wm-yn{}", header_name(project_name)));

    if features.color_only {
        args.push("-Wm-yC".into());
    } else if features.color {
        args.push("-Wm-yc".into());
    }
    if features.sgb {
        args.push("-Wm-ys".into());
    }
    if features.target == TargetPlatform::Pocket {
        args.push("-msm83:ap".into());
    }
    if features.debug {
        args.extend(["-Wf--debug", "-Wl-m", "-Wl-w", "-Wl-y"].map(String::from));
    }
    match features.music_driver {
        MusicDriver::Huge => args.push("-Wl-lhUGEDriver.lib".into()),
        MusicDriver::GbtPlayer => {
            args.push("-Wl-lgbt_player.lib".into());
            args.push("-Wb-reserve=1:800".into());
        }
    }
    if features.batteryless {
        // Banks 12-15 hold the flash copy of the save.
        for bank in (12..=15).rev() {
            args.push(format!("-Wb-reserve={}:4000", bank));
        }
        args.push("-Wl-g__start_save=12".into());
    } else {
        args.push("-Wl-g__start_save=0".into());
    }
    args.push("-o".into());
    args.push(format!("{}/{}", ROM_DIR, rom_filename));
    args.push(format!("-Wl-f{}", LINKFILE));
    args
}

pub fn gba_link_args() -> Vec<String> {
    let mut args: Vec<String> = GBA_ARCH_FLAGS.map(String::from).to_vec();
    args.extend(
        [
            "-T",
            "gba.ld",
            "-o",
            "build/rom/game.elf",
            "-Wl,-Map,build/rom/game.map",
        ]
        .map(String::from),
    );
    args.push(format!("@{}", LINKFILE));
    args
}

pub struct LinkJob<'a> {
    pub build_root: &'a Path,
    pub features: &'a BuildFeatures,
    pub toolchain: &'a Toolchain,
    pub env: &'a BuildEnv,
    pub objects: &'a [CompileCommand],
    pub rom_filename: &'a str,
    pub project_name: &'a str,
}

/// Links every object into `build/rom/<rom_filename>` and runs the target's
/// post-link steps. Returns the path of the finished ROM.
pub fn link(ctx: &BuildContext, job: &LinkJob<'_>) -> Result<PathBuf> {
    ctx.token().check()?;
    info!("Linking...");
    let root = job.build_root;
    let linkfile = root.join(LINKFILE);
    if let Some(parent) = linkfile.parent() {
        fs::create_dir_all(parent).map_err(|e| BuildError::io_path("create", parent, e))?;
    }
    fs::write(&linkfile, link_manifest(job.objects))
        .map_err(|e| BuildError::io_path("write", &linkfile, e))?;
    let rom_dir = root.join(ROM_DIR);
    fs::create_dir_all(&rom_dir).map_err(|e| BuildError::io_path("create", &rom_dir, e))?;

    let rom = rom_dir.join(job.rom_filename);
    match job.toolchain {
        Toolchain::Gbdk(gbdk) => link_gb(ctx, job, gbdk)?,
        Toolchain::DevkitPro(dkp) => link_gba(ctx, job, dkp, &rom)?,
    }
    Ok(rom)
}

fn link_gb(ctx: &BuildContext, job: &LinkJob<'_>, gbdk: &GbdkPaths) -> Result<()> {
    let command = ToolCommand::new("Linking", gbdk.lcc()).args(gb_link_args(
        job.features,
        job.rom_filename,
        job.project_name,
    ));
    run_tool(ctx, &command, job.build_root, job.env)?;

    let globals = job.build_root.join("include/data/game_globals.i");
    if globals.is_file() {
        copy_file(&globals, &job.build_root.join(ROM_DIR).join("globals.i"))?;
    }
    Ok(())
}

fn link_gba(ctx: &BuildContext, job: &LinkJob<'_>, dkp: &DevkitProPaths, rom: &Path) -> Result<()> {
    let root = job.build_root;
    run_tool(
        ctx,
        &ToolCommand::new("Linking", dkp.gcc()).args(gba_link_args()),
        root,
        job.env,
    )?;

    ctx.token().check()?;
    info!("Converting ELF to binary ROM...");
    let elf = root.join(ROM_DIR).join("game.elf");
    if dkp.objcopy().is_file() {
        let objcopy = ToolCommand::new("objcopy", dkp.objcopy()).args([
            "-O".to_string(),
            "binary".to_string(),
            elf.display().to_string(),
            rom.display().to_string(),
        ]);
        run_tool(ctx, &objcopy, root, job.env)?;
    } else {
        warn!("objcopy not found in devkitARM toolchain, extracting the ROM image directly");
        let image = extract_binary(&elf)?;
        fs::write(rom, image).map_err(|e| BuildError::io_path("write", rom, e))?;
    }

    ctx.token().check()?;
    info!("Padding ROM to minimum size...");
    pad_rom(rom, GBA_MIN_ROM_SIZE)?;

    ctx.token().check()?;
    if dkp.gbafix().is_file() {
        info!("Fixing GBA ROM header...");
        let gbafix = ToolCommand::new("gbafix", dkp.gbafix()).arg(rom.display().to_string());
        run_tool(ctx, &gbafix, root, job.env)?;
    } else {
        warn!("gbafix not found at {}, ROM header was not fixed", dkp.gbafix().display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use gbsc_core::project::{ColorMode, Settings};

    use super::*;
    use crate::make::BuildType;

    #[test]
    fn header_names_keep_only_letters() {
        assert_eq!(header_name("My Game 2!"), "MYGAME");
        assert_eq!(header_name("The Legend of the Very Long Name"), "THELEGENDOFTHEV");
        assert_eq!(header_name("123"), "GBSTUDIO");
    }

    #[test]
    fn game_boy_link_flags_follow_features() {
        let settings = Settings {
            color_mode: ColorMode::Color,
            cart_type: CartType::Mbc3,
            batteryless_enabled: true,
            ..Default::default()
        };
        let features = BuildFeatures::new(&settings, BuildType::Rom, false);
        let args = gb_link_args(&features, "game.gbc", "Demo");

        assert_eq!(args[0], "-Wm-yt0x10");
        assert!(args.contains(&"-Wm-ynDEMO".to_string()));
        assert!(args.contains(&"-Wm-yC".to_string()));
        assert!(!args.contains(&"-Wm-yc".to_string()));
        assert!(args.contains(&"-Wb-reserve=12:4000".to_string()));
        assert!(args.contains(&"-Wl-g__start_save=12".to_string()));
        assert!(args.contains(&"-Wl-lgbt_player.lib".to_string()));
        assert_eq!(args[args.len() - 2], "build/rom/game.gbc");
        assert_eq!(args[args.len() - 1], "-Wl-fobj/linkfile.lk");
    }

    #[test]
    fn web_link_keeps_save_in_bank_zero() {
        let settings = Settings {
            batteryless_enabled: true,
            ..Default::default()
        };
        let features = BuildFeatures::new(&settings, BuildType::Web, false);
        let args = gb_link_args(&features, "game.gb", "");
        assert!(args.contains(&"-Wl-g__start_save=0".to_string()));
        assert!(args.contains(&"-Wm-yt0x1E".to_string()));
        assert!(args.contains(&"-Wm-ynGBSTUDIO".to_string()));
    }

    #[test]
    fn gba_link_uses_linker_script_and_map() {
        let args = gba_link_args();
        let script = args.iter().position(|a| a == "-T").unwrap();
        assert_eq!(args[script + 1], "gba.ld");
        assert!(args.contains(&"-Wl,-Map,build/rom/game.map".to_string()));
        assert_eq!(args.last().unwrap(), "@obj/linkfile.lk");
    }
}
