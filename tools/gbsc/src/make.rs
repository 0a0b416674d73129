//! End-to-end build of a project.

use std::path::{Path, PathBuf};

use anyhow::Context;
use gbsc_core::template::eject_engine;
use gbsc_core::{
    AssetEncoder, CompileOptions, CompiledData, ProjectResources, Reporter, TargetPlatform,
    compile_project,
};
use tracing::{info, warn};

use crate::cache::{ObjectCache, cache_keys};
use crate::commands::{CompileCommand, plan_compile};
use crate::context::BuildContext;
use crate::env::{BuildEnv, BuildFeatures};
use crate::error::BuildError;
use crate::fs_util::{copy_file, remove_dir_if_exists};
use crate::link::{LinkJob, link};
use crate::scheduler::{default_jobs, run_parallel};
use crate::spawn::run_tool;
use crate::toolchain::Toolchain;
use crate::validate::validate_ejected_build;
use crate::web::export_web;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildType {
    Rom,
    Web,
    Pocket,
    Gba,
}

impl BuildType {
    pub fn target(self) -> TargetPlatform {
        match self {
            BuildType::Rom | BuildType::Web => TargetPlatform::Gb,
            BuildType::Pocket => TargetPlatform::Pocket,
            BuildType::Gba => TargetPlatform::Gba,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub build_type: BuildType,
    /// Directory of the project file; assets are resolved against it.
    pub project_root: PathBuf,
    /// Build tree. Wiped and recreated by every build that compiles.
    pub output_root: PathBuf,
    /// Scratch directory handed to the toolchain, also where GBDK is looked
    /// for when `GBDK_HOME` is not set.
    pub tmp_dir: PathBuf,
    /// Object cache location; `None` disables caching.
    pub cache_dir: Option<PathBuf>,
    pub rom_filename: String,
    pub debug: bool,
    /// When false only the engine and generated data are written.
    pub make: bool,
    pub jobs: usize,
    /// Toolchain to use instead of discovering one.
    pub toolchain: Option<Toolchain>,
}

impl BuildOptions {
    pub fn new(build_type: BuildType, project_root: impl Into<PathBuf>, tmp_dir: impl Into<PathBuf>) -> Self {
        let tmp_dir = tmp_dir.into();
        BuildOptions {
            build_type,
            project_root: project_root.into(),
            output_root: tmp_dir.join("_gbsbuild"),
            cache_dir: Some(tmp_dir.join("_gbscache")),
            tmp_dir,
            rom_filename: "game.gb".to_string(),
            debug: false,
            make: true,
            jobs: default_jobs(),
            toolchain: None,
        }
    }
}

#[derive(Debug)]
pub struct BuildOutput {
    pub compiled: CompiledData,
    /// The finished ROM, when the build was made.
    pub rom: Option<PathBuf>,
    pub warnings: Vec<String>,
}

/// Compiles `project`, ejects the engine with the compiled data and, when
/// `options.make` is set, builds the ROM.
///
/// Fails with [`BuildError::Cancelled`] somewhere in its cause chain when
/// `ctx` is cancelled while the build runs.
pub fn build_project(
    ctx: &BuildContext,
    project: &ProjectResources,
    options: &BuildOptions,
    encoder: &dyn AssetEncoder,
) -> anyhow::Result<BuildOutput> {
    ctx.token().check()?;
    let root = options.output_root.as_path();
    let target = options.build_type.target();

    let reporter = Reporter::with_interrupt(ctx.token().flag());
    let compiled = compile_project(
        project,
        &CompileOptions::new(&options.project_root, target),
        encoder,
        &reporter,
    )
    .map_err(BuildError::from)?;

    // The previous build tree survives a project that fails to compile.
    remove_dir_if_exists(root)?;
    eject_engine(root).context("failed to eject engine")?;
    compiled
        .write(root)
        .map_err(BuildError::from)
        .context("failed to write generated data")?;
    validate_ejected_build(root, target, &reporter);

    if !options.make {
        return Ok(BuildOutput {
            compiled,
            rom: None,
            warnings: reporter.warnings(),
        });
    }
    ctx.token().check()?;

    let toolchain = match &options.toolchain {
        Some(toolchain) => toolchain.clone(),
        None => Toolchain::discover(target, &options.tmp_dir.join("_gbstools"))?,
    };
    let features = BuildFeatures::new(&project.settings, options.build_type, options.debug);
    let env = BuildEnv::for_build(&features, &toolchain, &options.tmp_dir);

    let commands = plan_compile(root, &features, &toolchain)?;
    let cache = options.cache_dir.as_deref().map(ObjectCache::new);
    let keys = match &cache {
        Some(_) => cache_keys(root, &commands, &env)?,
        None => Vec::new(),
    };
    if let Some(cache) = &cache {
        if let Err(e) = cache.fetch(root, &commands, &keys) {
            warn!("{}", e);
        }
    }

    compile_sources(ctx, root, &commands, &env, options.jobs)?;

    let rom = link(
        ctx,
        &LinkJob {
            build_root: root,
            features: &features,
            toolchain: &toolchain,
            env: &env,
            objects: &commands,
            rom_filename: &options.rom_filename,
            project_name: &project.metadata.name,
        },
    )
    .context("failed to link ROM")?;
    ctx.token().check()?;

    match options.build_type {
        BuildType::Pocket => {
            copy_file(&rom, &root.join("build/pocket").join(&options.rom_filename))?;
        }
        BuildType::Web => {
            export_web(project, &rom, &options.rom_filename, &root.join("build/web"))
                .context("failed to export web build")?;
        }
        BuildType::Rom | BuildType::Gba => {}
    }

    if let Some(cache) = &cache {
        if let Err(e) = cache.store(root, &commands, &keys) {
            warn!("{}", e);
        }
    }

    info!("Build complete: {}", rom.display());
    Ok(BuildOutput {
        compiled,
        rom: Some(rom),
        warnings: reporter.warnings(),
    })
}

fn compile_sources(
    ctx: &BuildContext,
    root: &Path,
    commands: &[CompileCommand],
    env: &BuildEnv,
    jobs: usize,
) -> anyhow::Result<()> {
    let pending: Vec<&CompileCommand> = commands.iter().filter(|c| !c.is_built(root)).collect();
    info!(
        "Compiling {} of {} sources",
        pending.len(),
        commands.len()
    );
    let obj = root.join("obj");
    std::fs::create_dir_all(&obj).map_err(|e| BuildError::io_path("create", &obj, e))?;

    run_parallel(ctx, jobs, pending, |command| {
        info!("{}", command.tool.label);
        run_tool(ctx, &command.tool, root, env)
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_types_map_to_targets() {
        assert_eq!(BuildType::Web.target(), TargetPlatform::Gb);
        assert_eq!(BuildType::Pocket.target(), TargetPlatform::Pocket);
        assert_eq!(BuildType::Gba.target(), TargetPlatform::Gba);
    }

    #[test]
    fn default_options_live_under_tmp() {
        let options = BuildOptions::new(BuildType::Rom, "/projects/demo", "/tmp");
        assert_eq!(options.output_root, Path::new("/tmp/_gbsbuild"));
        assert_eq!(options.cache_dir.as_deref(), Some(Path::new("/tmp/_gbscache")));
        assert!(options.make);
        assert!(options.jobs >= 1);
    }
}
