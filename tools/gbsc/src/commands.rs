//! Compile commands for the ejected source tree.

use std::path::{Path, PathBuf};

use crate::env::BuildFeatures;
use crate::error::Result;
use crate::fs_util::walk_files;
use crate::spawn::ToolCommand;
use crate::toolchain::Toolchain;

/// Compilation of one source file into one object file. Paths are relative
/// to the build root, which is also the working directory of the tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileCommand {
    pub source: PathBuf,
    pub object: PathBuf,
    pub tool: ToolCommand,
}

impl CompileCommand {
    /// Whether the object already exists, from the cache or an earlier run.
    pub fn is_built(&self, build_root: &Path) -> bool {
        build_root.join(&self.object).is_file()
    }
}

/// `obj/<stem>.o` for a source file.
pub fn object_path(source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    Path::new("obj").join(format!("{}.o", stem))
}

/// Every `.c` and `.s` file under `src/`, relative to `build_root`, minus the
/// sources of the music driver that is not in use.
pub fn source_files(build_root: &Path, features: &BuildFeatures) -> Result<Vec<PathBuf>> {
    let inactive = features.music_driver.inactive_define();
    let sources = walk_files(&build_root.join("src"))?
        .into_iter()
        .filter(|path| matches!(path.extension().and_then(|e| e.to_str()), Some("c" | "s")))
        .filter_map(|path| path.strip_prefix(build_root).ok().map(Path::to_path_buf))
        .filter(|path| !path.to_string_lossy().contains(inactive))
        .collect();
    Ok(sources)
}

fn gb_flags(features: &BuildFeatures, asxxxx: &Path) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-Iinclude".into(),
        "-Wa-Iinclude".into(),
        format!("-Wa-I{}", asxxxx.display()),
        "-Wl-a".into(),
        "-Wf-MMD".into(),
        "-c".into(),
        format!("-Wf--max-allocs-per-node{}", features.compiler_preset),
    ];
    if features.color {
        args.push("-DCGB".into());
    }
    if features.sgb {
        args.push("-DSGB".into());
    }
    args.push(format!("-D{}", features.music_driver.define()));
    if features.batteryless {
        args.push("-DBATTERYLESS".into());
    }
    args.push(format!("-DRUMBLE_ENABLE={}u", features.rumble_bit()));
    if features.debug {
        args.extend(
            [
                "-Wf--fverbose-asm",
                "-Wf--debug",
                "-Wl-m",
                "-Wl-w",
                "-Wl-y",
                "-DVM_DEBUG_OUTPUT",
                "-Wf--nolospre",
                "-Wf--nogcse",
            ]
            .map(String::from),
        );
    }
    if features.target == gbsc_core::TargetPlatform::Pocket {
        args.push("-msm83:ap".into());
    }
    args
}

/// Target flags shared by compiling and linking for the GBA.
pub const GBA_ARCH_FLAGS: [&str; 3] = ["-mthumb", "-mthumb-interwork", "-mcpu=arm7tdmi"];

fn gba_flags(features: &BuildFeatures) -> Vec<String> {
    let mut args: Vec<String> = GBA_ARCH_FLAGS.map(String::from).to_vec();
    args.extend(
        ["-Wall", "-Wextra", "-O2", "-fomit-frame-pointer", "-Iinclude", "-c"].map(String::from),
    );
    if features.debug {
        args.push("-g".into());
        args.push("-DDEBUG".into());
    }
    args
}

/// One command per source file, whether or not its object exists yet.
pub fn plan_compile(
    build_root: &Path,
    features: &BuildFeatures,
    toolchain: &Toolchain,
) -> Result<Vec<CompileCommand>> {
    let flags = match toolchain {
        Toolchain::Gbdk(gbdk) => gb_flags(features, &gbdk.root.join("lib").join("small").join("asxxxx")),
        Toolchain::DevkitPro(_) => gba_flags(features),
    };
    let compiler = toolchain.compiler();

    let commands = source_files(build_root, features)?
        .into_iter()
        .map(|source| {
            let object = object_path(&source);
            let tool = ToolCommand::new(format!("Compiling: {}", source.display()), &compiler)
                .args(flags.iter().cloned())
                .args([
                    "-o".to_string(),
                    object.display().to_string(),
                    source.display().to_string(),
                ]);
            CompileCommand {
                source,
                object,
                tool,
            }
        })
        .collect();
    Ok(commands)
}

/// Object list handed to the linker, one path per line.
pub fn link_manifest(commands: &[CompileCommand]) -> String {
    commands
        .iter()
        .map(|c| c.object.display().to_string())
        .collect::<Vec<_>>()
        .join("\n")
}
