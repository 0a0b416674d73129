use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use gbsc::fs_util::{copy_dir_all, copy_file, remove_dir_if_exists};
use gbsc::{BuildContext, BuildOptions, BuildOutput, BuildType, build_project, rom_filename};
use gbsc_core::{ProjectResources, TileEncoder};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gbsc")]
#[command(version, about = "Compile game projects into Game Boy ROMs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log progress and warnings
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Export only the generated data, not the engine
    #[arg(short = 'd', long, alias = "onlyData", global = true)]
    only_data: bool,

    /// Scratch directory for build trees and tools (defaults to the OS temp dir)
    #[arg(long, env = "GBSC_TMP_DIR", global = true)]
    tmp_dir: Option<PathBuf>,

    /// Object cache directory (defaults to <tmp>/_gbscache)
    #[arg(long, env = "GBSC_CACHE_DIR", global = true)]
    cache_dir: Option<PathBuf>,

    /// Number of parallel compile jobs
    #[arg(short, long, env = "GBSC_JOBS", global = true)]
    jobs: Option<usize>,

    /// Compile every source even when a cached object exists
    #[arg(long, global = true)]
    no_cache: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the engine with the compiled project data
    Export {
        /// Path to the project file
        project: PathBuf,
        /// Output directory
        destination: PathBuf,
    },

    /// Build a Game Boy ROM
    #[command(name = "make:rom")]
    MakeRom {
        project: PathBuf,
        /// Path of the ROM file to write
        destination: PathBuf,
    },

    /// Build an Analogue Pocket ROM
    #[command(name = "make:pocket")]
    MakePocket { project: PathBuf, destination: PathBuf },

    /// Build a Game Boy Advance ROM
    #[command(name = "make:gba")]
    MakeGba { project: PathBuf, destination: PathBuf },

    /// Build a playable web bundle
    #[command(name = "make:web")]
    MakeWeb { project: PathBuf, destination: PathBuf },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "info" } else { "error" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn build(
    cli: &Cli,
    project_path: &Path,
    build_type: BuildType,
    make: bool,
) -> anyhow::Result<(BuildOutput, BuildOptions)> {
    let project = ProjectResources::load(project_path)
        .with_context(|| format!("failed to load project {}", project_path.display()))?;
    let project_root = project_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let tmp_dir = cli.tmp_dir.clone().unwrap_or_else(std::env::temp_dir);

    let mut options = BuildOptions::new(build_type, project_root, tmp_dir);
    options.make = make;
    options.debug = project.settings.debugger_enabled;
    options.rom_filename = rom_filename(
        &project.settings.rom_filename,
        &project.metadata.name,
        project.is_color_only(),
        build_type,
    );
    if cli.no_cache {
        options.cache_dir = None;
    } else if let Some(dir) = &cli.cache_dir {
        options.cache_dir = Some(dir.clone());
    }
    if let Some(jobs) = cli.jobs {
        options.jobs = jobs.max(1);
    }

    let ctx = BuildContext::new();
    let output = build_project(&ctx, &project, &options, &TileEncoder)?;
    for warning in &output.warnings {
        warn!("{}", warning);
    }
    Ok((output, options))
}

fn export(cli: &Cli, project: &Path, destination: &Path) -> anyhow::Result<()> {
    let (_, options) = build(cli, project, BuildType::Rom, false)?;
    let root = &options.output_root;
    if cli.only_data {
        for data in ["src/data", "include/data"] {
            let dest = destination.join(data);
            remove_dir_if_exists(&dest)?;
            copy_dir_all(&root.join(data), &dest)?;
        }
    } else {
        copy_dir_all(root, destination)?;
    }
    info!("Exported to {}", destination.display());
    Ok(())
}

fn make_rom(cli: &Cli, project: &Path, destination: &Path, build_type: BuildType) -> anyhow::Result<()> {
    let (output, _) = build(cli, project, build_type, true)?;
    let Some(rom) = output.rom else {
        bail!("build produced no ROM");
    };
    copy_file(&rom, destination)?;
    info!("Wrote {}", destination.display());
    Ok(())
}

fn make_web(cli: &Cli, project: &Path, destination: &Path) -> anyhow::Result<()> {
    let (_, options) = build(cli, project, BuildType::Web, true)?;
    copy_dir_all(&options.output_root.join("build/web"), destination)?;
    info!("Wrote web build to {}", destination.display());
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match &cli.command {
        Commands::Export { project, destination } => export(&cli, project, destination),
        Commands::MakeRom { project, destination } => make_rom(&cli, project, destination, BuildType::Rom),
        Commands::MakePocket { project, destination } => {
            make_rom(&cli, project, destination, BuildType::Pocket)
        }
        Commands::MakeGba { project, destination } => make_rom(&cli, project, destination, BuildType::Gba),
        Commands::MakeWeb { project, destination } => make_web(&cli, project, destination),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
