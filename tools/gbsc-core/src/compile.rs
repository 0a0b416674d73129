use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use crate::encode::AssetEncoder;
use crate::error::{CompileError, Result};
use crate::output::{
    CodegenInput, CompiledData, SceneMapEntry, VariableMapEntry, generate_data_files,
    variable_aliases,
};
use crate::platform::TargetPlatform;
use crate::precompile::{PrecompileInput, precompile};
use crate::project::ProjectResources;
use crate::report::Reporter;
use crate::schema::EventSchema;
use crate::script::{LowerContext, SceneScripts, ScriptCompiler};
use crate::symbols::SymbolAllocator;
use crate::template::engine_scene_types;
use crate::walk::custom_event_lookup;

pub struct CompileOptions {
    /// Directory holding the project's `assets/` tree.
    pub project_root: PathBuf,
    pub target: TargetPlatform,
    pub schema: EventSchema,
}

impl CompileOptions {
    pub fn new(project_root: impl Into<PathBuf>, target: TargetPlatform) -> Self {
        CompileOptions {
            project_root: project_root.into(),
            target,
            schema: EventSchema::builtin(),
        }
    }
}

/// Distinct scene types in scene order, with `LOGO` moved to the front.
fn used_scene_types(project: &ProjectResources) -> Vec<String> {
    let mut types: Vec<String> = Vec::new();
    for scene in &project.scenes {
        if !types.contains(&scene.scene_type) {
            types.push(scene.scene_type.clone());
        }
    }
    if let Some(logo) = types.iter().position(|t| t == "LOGO") {
        let logo = types.remove(logo);
        types.insert(0, logo);
    }
    types
}

/// Compiles `project` into the generated data sources of the engine.
pub fn compile_project(
    project: &ProjectResources,
    options: &CompileOptions,
    encoder: &dyn AssetEncoder,
    reporter: &Reporter,
) -> Result<CompiledData> {
    if project.scenes.is_empty() {
        return Err(CompileError::NoScenes);
    }

    let custom_events = custom_event_lookup(&project.scripts);
    let mut symbols = SymbolAllocator::new();
    let precompiled = precompile(
        &PrecompileInput {
            project,
            project_root: &options.project_root,
            target: options.target,
            schema: &options.schema,
            custom_events: &custom_events,
        },
        encoder,
        &mut symbols,
        reporter,
    )?;

    let aliases = variable_aliases(project, &precompiled.variables);
    let alias_lookup: HashMap<String, String> = aliases
        .iter()
        .map(|(id, alias)| (id.clone(), alias.clone()))
        .collect();

    reporter.progress("Compiling scripts...");
    reporter.checkpoint()?;

    let mut compiler = ScriptCompiler::new(
        LowerContext {
            precompiled: &precompiled,
            schema: &options.schema,
            custom_events: &custom_events,
            variables: &alias_lookup,
        },
        &mut symbols,
        reporter,
    );
    let scene_scripts: Vec<SceneScripts> = precompiled
        .scenes
        .iter()
        .map(|scene| compiler.compile_scene(scene))
        .collect();
    let mut files = compiler.into_artifacts()?;

    let used_scene_type_ids = used_scene_types(project);
    let engine_types = engine_scene_types()?;
    generate_data_files(
        &CodegenInput {
            project,
            precompiled: &precompiled,
            scene_scripts: &scene_scripts,
            variables: &aliases,
            used_scene_types: &used_scene_type_ids,
            engine_scene_types: &engine_types,
        },
        &mut files,
    )?;

    let scene_map: BTreeMap<String, SceneMapEntry> = precompiled
        .scenes
        .iter()
        .map(|scene| {
            let entry = SceneMapEntry {
                id: scene.scene.id.clone(),
                name: scene.name.clone(),
                symbol: scene.symbol.clone(),
            };
            (scene.symbol.clone(), entry)
        })
        .collect();

    let variable_map: BTreeMap<String, VariableMapEntry> = aliases
        .iter()
        .map(|(id, alias)| {
            let name = project
                .variables
                .variables
                .iter()
                .find(|v| v.id == *id)
                .map_or_else(|| format!("Variable {}", id), |v| v.name.clone());
            let entry = VariableMapEntry {
                symbol: alias.clone(),
                id: id.clone(),
                name,
                is_local: false,
                entity_type: "scene".to_string(),
                entity_id: String::new(),
                scene_id: String::new(),
            };
            (alias.clone(), entry)
        })
        .collect();

    reporter.progress(format!("Generated {} files", files.len()));

    Ok(CompiledData {
        files,
        scene_map,
        variable_map,
        used_scene_type_ids,
    })
}
