use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use gbsc_core::encode::{EncodeContext, EncodedBackground, EncodedSprite};
use gbsc_core::project::{
    Actor, Background, CustomEvent, Font, Scene, ScriptEvent, SpriteSheet, commands,
};
use gbsc_core::{
    AssetEncoder, CompileError, CompileOptions, ProjectResources, Reporter, Result,
    TargetPlatform, compile_project,
};

/// Encoder returning fixed data so no image files are needed.
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

fn call(custom: &str, text: &str) -> ScriptEvent {
    ScriptEvent::new(commands::EVENT_CALL_CUSTOM_EVENT)
        .with_arg("customEventId", custom)
        .with_arg("message", text)
}

fn project(actor_scripts: Vec<Vec<ScriptEvent>>) -> ProjectResources {
    let mut project = ProjectResources::default();
    project.metadata.name = "Demo".into();
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
    project.scripts = vec![CustomEvent {
        id: "say".into(),
        name: "Say".into(),
        script: vec![ScriptEvent::new("EVENT_TEXT").with_arg("text", "$message$")],
        ..Default::default()
    }];
    project.scenes = vec![Scene {
        id: "s1".into(),
        name: "Town".into(),
        symbol: "scene_town".into(),
        background_id: "bg".into(),
        player_sprite_sheet_id: "hero".into(),
        actors: actor_scripts
            .into_iter()
            .enumerate()
            .map(|(i, script)| Actor {
                id: format!("a{}", i),
                symbol: format!("actor_{}", i),
                sprite_sheet_id: "hero".into(),
                script,
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    }];
    project
}

fn compile(project: &ProjectResources, root: &Path) -> Result<gbsc_core::CompiledData> {
    compile_project(
        project,
        &CompileOptions::new(root, TargetPlatform::Gb),
        &StubEncoder,
        &Reporter::new(),
    )
}

#[test]
fn empty_project_fails_before_writing_anything() {
    let dir = tempfile::tempdir().unwrap();
    let err = compile(&ProjectResources::default(), dir.path()).unwrap_err();
    assert!(matches!(err, CompileError::NoScenes));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn identical_custom_calls_share_one_compiled_script() {
    let dir = tempfile::tempdir().unwrap();
    let project = project(vec![vec![call("say", "hi")], vec![call("say", "hi")]]);
    let data = compile(&project, dir.path()).unwrap();

    assert!(data.files.contains("script_custom_0.s"));
    assert!(data.files.contains("script_custom_0.h"));
    assert!(!data.files.contains("script_custom_1.s"));
    for actor in ["actor_0_interact.s", "actor_1_interact.s"] {
        let listing = data.files.get(actor).unwrap();
        assert!(listing.contains("VM_CALL_FAR ___bank_script_custom_0, _script_custom_0"));
    }
    let body = data.files.get("script_custom_0.s").unwrap();
    assert!(body.contains(".asciz \"text=hi\""));
    assert!(body.contains("VM_RET_FAR"));
}

#[test]
fn different_bound_arguments_compile_separately() {
    let dir = tempfile::tempdir().unwrap();
    let project = project(vec![vec![call("say", "hi")], vec![call("say", "bye")]]);
    let data = compile(&project, dir.path()).unwrap();
    assert!(data.files.contains("script_custom_0.s"));
    assert!(data.files.contains("script_custom_1.s"));
}

#[test]
fn scene_tables_and_maps_are_generated() {
    let dir = tempfile::tempdir().unwrap();
    let project = project(vec![vec![ScriptEvent::new("EVENT_TEXT")]]);
    let data = compile(&project, dir.path()).unwrap();

    for file in [
        "scene_town.c",
        "scene_town_actors.c",
        "scene_town_collisions.c",
        "scene_town_sprites.c",
        "scene_town_init.s",
        "bg_town.c",
        "bg_town_tileset.c",
        "bg_town_tilemap.c",
        "sprite_hero.c",
        "font_mono.c",
        "palette_0.c",
        "frame_image.c",
        "cursor_image.c",
        "spritesheet_none.c",
        "game_globals.i",
        "data_bootstrap.h",
        "scene_types.h",
        "music_data.h",
        "script_engine_init.s",
        "game_signature.c",
    ] {
        assert!(data.files.contains(file), "missing {}", file);
    }

    let init = data.files.get("scene_town_init.s").unwrap();
    assert!(init.contains("VM_SET_SPRITE_MODE .MODE_8X16"));
    assert!(init.contains("VM_FADE_IN 1"));
    assert_eq!(data.scene_map["scene_town"].id, "s1");
    assert_eq!(data.used_scene_type_ids, vec!["TOPDOWN"]);

    // The UI images were provisioned into the project.
    assert!(dir.path().join("assets/ui/frame.png").is_file());
}

#[test]
fn auto_fade_goes_before_first_text() {
    let dir = tempfile::tempdir().unwrap();
    let mut project = project(vec![]);
    project.scenes[0].script = vec![
        ScriptEvent::new("EVENT_SET_VALUE"),
        ScriptEvent::new("EVENT_TEXT"),
    ];
    let data = compile(&project, dir.path()).unwrap();
    let init = data.files.get("scene_town_init.s").unwrap();
    let fade = init.find("VM_FADE_IN").unwrap();
    assert!(init.find("\"EVENT_SET_VALUE\"").unwrap() < fade);
    assert!(fade < init.find("\"EVENT_TEXT\"").unwrap());
}

#[test]
fn missing_fonts_provision_default_and_fail() {
    let dir = tempfile::tempdir().unwrap();
    let mut project = project(vec![]);
    project.fonts.clear();
    let err = compile(&project, dir.path()).unwrap_err();
    assert!(matches!(err, CompileError::MissingFonts));
    assert!(dir.path().join("assets/fonts/gbs-mono.png").is_file());
}

#[test]
fn interrupted_compile_stops_before_scripts() {
    let dir = tempfile::tempdir().unwrap();
    let flag = Arc::new(AtomicBool::new(true));
    let err = compile_project(
        &project(vec![]),
        &CompileOptions::new(dir.path(), TargetPlatform::Gb),
        &StubEncoder,
        &Reporter::with_interrupt(flag),
    )
    .unwrap_err();
    assert!(matches!(err, CompileError::Interrupted));
}

#[test]
fn written_tree_splits_sources_and_headers() {
    let dir = tempfile::tempdir().unwrap();
    let build = dir.path().join("build-root");
    let data = compile(&project(vec![]), dir.path()).unwrap();
    data.write(&build).unwrap();
    assert!(build.join("src/data/scene_town.c").is_file());
    assert!(build.join("include/data/scene_town.h").is_file());
    assert!(build.join("include/data/game_globals.i").is_file());
    assert!(build.join("build/scene_map.json").is_file());
}
