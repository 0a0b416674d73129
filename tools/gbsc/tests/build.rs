#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use gbsc::rom_image::GBA_MIN_ROM_SIZE;
use gbsc::toolchain::{DevkitProPaths, GbdkPaths};
use gbsc::{BuildContext, BuildError, BuildOptions, BuildType, Toolchain, build_project};
use gbsc_core::encode::{EncodeContext, EncodedBackground, EncodedSprite};
use gbsc_core::project::{Actor, Background, Font, Scene, SpriteSheet};
use gbsc_core::{AssetEncoder, ProjectResources, Result};

struct StubEncoder;

impl AssetEncoder for StubEncoder {
    fn background(
        &self,
        _background: &Background,
        _common: Option<&gbsc_core::project::Tileset>,
        _ctx: &EncodeContext<'_>,
    ) -> Result<EncodedBackground> {
        Ok(EncodedBackground {
            vram: [vec![0; 32], Vec::new()],
            tilemap: vec![0, 1, 1, 0],
            width: 2,
            height: 2,
            ..Default::default()
        })
    }

    fn sprite(&self, _sprite: &SpriteSheet, _ctx: &EncodeContext<'_>) -> Result<EncodedSprite> {
        Ok(EncodedSprite {
            vram: [vec![0xAA; 64], Vec::new()],
            num_tiles: 4,
        })
    }

    fn tiles(&self, _path: &Path) -> Result<Vec<u8>> {
        Ok(vec![0xFF; 16])
    }

    fn audio(&self, _path: &Path) -> Result<Vec<u8>> {
        Ok(vec![1, 2, 3])
    }
}

fn project() -> ProjectResources {
    let mut project = ProjectResources::default();
    project.metadata.name = "Test Quest".into();
    project.metadata.author = "Tester".into();
    project.backgrounds = vec![Background {
        id: "bg".into(),
        name: "Town".into(),
        symbol: "bg_town".into(),
        ..Default::default()
    }];
    project.sprites = vec![SpriteSheet {
        id: "hero".into(),
        name: "Hero".into(),
        symbol: "sprite_hero".into(),
        ..Default::default()
    }];
    project.fonts = vec![Font {
        id: "font".into(),
        name: "Mono".into(),
        symbol: "font_mono".into(),
        ..Default::default()
    }];
    project.scenes = vec![Scene {
        id: "s1".into(),
        name: "Town".into(),
        symbol: "scene_town".into(),
        background_id: "bg".into(),
        player_sprite_sheet_id: "hero".into(),
        actors: vec![Actor {
            id: "a0".into(),
            symbol: "actor_0".into(),
            sprite_sheet_id: "hero".into(),
            ..Default::default()
        }],
        ..Default::default()
    }];
    project
}

fn script(path: &Path, body: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}

/// Shell snippet that logs the call to `log` and writes `content` to the
/// path following `-o`.
fn writes_output(log: &Path, content: &str) -> String {
    format!(
        r#"echo "$@" >> "{}"
out=""
prev=""
for arg in "$@"; do
  if [ "$prev" = "-o" ]; then out="$arg"; fi
  prev="$arg"
done
mkdir -p "$(dirname "$out")"
printf '{}' > "$out""#,
        log.display(),
        content
    )
}

struct Workspace {
    dir: tempfile::TempDir,
}

impl Workspace {
    fn new() -> Self {
        Workspace {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    fn calls(&self) -> Vec<String> {
        fs::read_to_string(self.path("calls.log"))
            .unwrap_or_default()
            .lines()
            .map(String::from)
            .collect()
    }

    fn gbdk(&self, lcc_body: &str) -> Toolchain {
        let root = self.path("gbdk");
        script(&root.join("bin/lcc"), lcc_body);
        Toolchain::Gbdk(GbdkPaths::at(root))
    }

    fn options(&self, build_type: BuildType, toolchain: Toolchain) -> BuildOptions {
        let mut options = BuildOptions::new(build_type, self.path("project"), self.path("tmp"));
        options.toolchain = Some(toolchain);
        options.jobs = 2;
        options
    }
}

fn is_link(call: &str) -> bool {
    call.contains("linkfile.lk")
}

#[test]
fn game_boy_rom_is_compiled_linked_and_cached() {
    let ws = Workspace::new();
    let toolchain = ws.gbdk(&writes_output(&ws.path("calls.log"), "ROM"));
    let options = ws.options(BuildType::Rom, toolchain);
    let project = project();

    let output = build_project(&BuildContext::new(), &project, &options, &StubEncoder).unwrap();
    let rom = output.rom.unwrap();
    assert_eq!(rom, options.output_root.join("build/rom/game.gb"));
    assert_eq!(fs::read(&rom).unwrap(), b"ROM");
    assert!(options.output_root.join("build/rom/globals.i").is_file());

    let calls = ws.calls();
    let compiles = calls.iter().filter(|c| !is_link(c)).count();
    assert!(compiles >= 3, "expected engine and data sources to compile: {:?}", calls);
    assert_eq!(calls.iter().filter(|c| is_link(c)).count(), 1);
    let link = calls.iter().find(|c| is_link(c)).unwrap();
    assert!(link.contains("-Wm-ynTESTQUEST"));

    let manifest = fs::read_to_string(options.output_root.join("obj/linkfile.lk")).unwrap();
    assert_eq!(manifest.lines().count(), compiles);

    // A second build of the same project restores every object from the cache.
    fs::remove_file(ws.path("calls.log")).unwrap();
    build_project(&BuildContext::new(), &project, &options, &StubEncoder).unwrap();
    let calls = ws.calls();
    assert_eq!(calls.len(), 1, "only the link should run: {:?}", calls);
    assert!(is_link(&calls[0]));
}

#[test]
fn disabled_cache_compiles_every_build() {
    let ws = Workspace::new();
    let toolchain = ws.gbdk(&writes_output(&ws.path("calls.log"), "ROM"));
    let mut options = ws.options(BuildType::Rom, toolchain);
    options.cache_dir = None;

    build_project(&BuildContext::new(), &project(), &options, &StubEncoder).unwrap();
    let first = ws.calls().len();
    fs::remove_file(ws.path("calls.log")).unwrap();
    build_project(&BuildContext::new(), &project(), &options, &StubEncoder).unwrap();
    assert_eq!(ws.calls().len(), first);
}

#[test]
fn export_only_writes_engine_and_data() {
    let ws = Workspace::new();
    let toolchain = ws.gbdk(&writes_output(&ws.path("calls.log"), "ROM"));
    let mut options = ws.options(BuildType::Rom, toolchain);
    options.make = false;

    let output = build_project(&BuildContext::new(), &project(), &options, &StubEncoder).unwrap();
    assert!(output.rom.is_none());
    assert!(options.output_root.join("src/core/main.c").is_file());
    assert!(options.output_root.join("include/data/game_globals.i").is_file());
    assert!(ws.calls().is_empty());
}

#[test]
fn failing_compiler_fails_the_build() {
    let ws = Workspace::new();
    let toolchain = ws.gbdk("echo 'main.c:12: error 101: syntax error' >&2\nexit 1");
    let options = ws.options(BuildType::Rom, toolchain);

    let err = build_project(&BuildContext::new(), &project(), &options, &StubEncoder).unwrap_err();
    assert!(!BuildError::is_cancelled(&err));
    assert!(format!("{:#}", err).contains("syntax error"));
}

#[test]
fn web_build_bundles_player_and_rom() {
    let ws = Workspace::new();
    let toolchain = ws.gbdk(&writes_output(&ws.path("calls.log"), "ROM"));
    let options = ws.options(BuildType::Web, toolchain);

    build_project(&BuildContext::new(), &project(), &options, &StubEncoder).unwrap();
    let web = options.output_root.join("build/web");
    assert_eq!(fs::read(web.join("rom/game.gb")).unwrap(), b"ROM");
    let index = fs::read_to_string(web.join("index.html")).unwrap();
    assert!(index.contains("Test Quest"));
    assert!(!index.contains("___PROJECT_NAME___"));
}

#[test]
fn pocket_build_copies_rom_for_the_pocket() {
    let ws = Workspace::new();
    let toolchain = ws.gbdk(&writes_output(&ws.path("calls.log"), "ROM"));
    let mut options = ws.options(BuildType::Pocket, toolchain);
    options.rom_filename = "game.pocket".into();

    build_project(&BuildContext::new(), &project(), &options, &StubEncoder).unwrap();
    assert!(options.output_root.join("build/pocket/game.pocket").is_file());
    assert!(ws.calls().iter().all(|c| c.contains("-msm83:ap")));
}

#[test]
fn gba_rom_is_padded_and_fixed() {
    let ws = Workspace::new();
    let log = ws.path("calls.log");
    let dkp = ws.path("devkitpro");
    script(&dkp.join("devkitARM/bin/arm-none-eabi-gcc"), &writes_output(&log, "ELF"));
    script(
        &dkp.join("devkitARM/bin/arm-none-eabi-objcopy"),
        &format!("echo objcopy \"$@\" >> \"{}\"\ncp \"$3\" \"$4\"", log.display()),
    );
    script(
        &dkp.join("tools/bin/gbafix"),
        &format!("echo gbafix \"$@\" >> \"{}\"", log.display()),
    );
    let mut options = ws.options(BuildType::Gba, Toolchain::DevkitPro(DevkitProPaths::at(&dkp)));
    options.rom_filename = "game.gba".into();

    let output = build_project(&BuildContext::new(), &project(), &options, &StubEncoder).unwrap();
    let rom = fs::read(output.rom.unwrap()).unwrap();
    assert_eq!(rom.len() as u64, GBA_MIN_ROM_SIZE);
    assert_eq!(&rom[..3], b"ELF");
    assert!(rom[3..].iter().all(|&b| b == 0xFF));

    let calls = ws.calls();
    assert!(calls.iter().any(|c| c.contains("-T gba.ld")));
    assert!(calls.iter().any(|c| c.starts_with("objcopy -O binary")));
    assert!(calls.last().unwrap().starts_with("gbafix"));
}

#[test]
fn project_without_scenes_keeps_the_previous_build() {
    let ws = Workspace::new();
    let toolchain = ws.gbdk(&writes_output(&ws.path("calls.log"), "ROM"));
    let options = ws.options(BuildType::Rom, toolchain);
    let output = build_project(&BuildContext::new(), &project(), &options, &StubEncoder).unwrap();
    let rom = output.rom.unwrap();
    fs::remove_file(ws.path("calls.log")).unwrap();

    let mut empty = project();
    empty.scenes.clear();
    let err = build_project(&BuildContext::new(), &empty, &options, &StubEncoder).unwrap_err();
    assert!(!BuildError::is_cancelled(&err));
    assert_eq!(fs::read(&rom).unwrap(), b"ROM");
    assert!(options.output_root.join("include/data/game_globals.i").is_file());
    assert!(ws.calls().is_empty());
}

#[test]
fn project_without_scenes_writes_nothing() {
    let ws = Workspace::new();
    let toolchain = ws.gbdk(&writes_output(&ws.path("calls.log"), "ROM"));
    let options = ws.options(BuildType::Rom, toolchain);
    let mut empty = project();
    empty.scenes.clear();

    build_project(&BuildContext::new(), &empty, &options, &StubEncoder).unwrap_err();
    assert!(!options.output_root.exists());
    assert!(ws.calls().is_empty());
}

#[test]
fn cancelled_context_builds_nothing() {
    let ws = Workspace::new();
    let toolchain = ws.gbdk(&writes_output(&ws.path("calls.log"), "ROM"));
    let options = ws.options(BuildType::Rom, toolchain);
    let ctx = BuildContext::new();
    ctx.cancel();

    let err = build_project(&ctx, &project(), &options, &StubEncoder).unwrap_err();
    assert!(BuildError::is_cancelled(&err));
    assert_eq!(err.to_string(), "BUILD_CANCELLED");
    assert!(ws.calls().is_empty());
}

#[cfg(target_os = "linux")]
fn is_running(pid: u32) -> bool {
    match fs::read_to_string(format!("/proc/{}/stat", pid)) {
        // The state field follows the parenthesised command name.
        Ok(stat) => !matches!(stat.rsplit(')').next().map(str::trim_start), Some(s) if s.starts_with('Z')),
        Err(_) => false,
    }
}

#[cfg(target_os = "linux")]
#[test]
fn cancelling_kills_running_tools() {
    use std::time::{Duration, Instant};

    let ws = Workspace::new();
    let pid_file = ws.path("sleeper.pid");
    let toolchain = ws.gbdk(&format!("sleep 30 &\necho $! > \"{}\"\nwait", pid_file.display()));
    let mut options = ws.options(BuildType::Rom, toolchain);
    options.jobs = 1;
    let project = project();
    let ctx = BuildContext::new();

    let started = Instant::now();
    let err = std::thread::scope(|scope| {
        let build = scope.spawn(|| build_project(&ctx, &project, &options, &StubEncoder));
        let deadline = Instant::now() + Duration::from_secs(20);
        while (ctx.processes().live().is_empty() || !pid_file.is_file()) && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(20));
        }
        // The pid file may exist before the shell has flushed the pid into it.
        let deadline = Instant::now() + Duration::from_secs(5);
        while fs::read_to_string(&pid_file).unwrap_or_default().trim().is_empty() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(20));
        }
        assert!(ctx.cancel() >= 1);
        build.join().unwrap().unwrap_err()
    });

    assert!(BuildError::is_cancelled(&err));
    assert!(started.elapsed() < Duration::from_secs(25));
    assert!(ctx.processes().live().is_empty());

    let sleeper: u32 = fs::read_to_string(&pid_file).unwrap().trim().parse().unwrap();
    let deadline = Instant::now() + Duration::from_secs(5);
    while is_running(sleeper) && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(20));
    }
    assert!(!is_running(sleeper), "background tool {} survived cancellation", sleeper);
}
