//! Generated file set and how it is laid out on disk.

mod codegen;

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::Serialize;
use tracing::debug;

use crate::error::{CompileError, Result};

pub use codegen::{CodegenInput, generate_data_files, variable_aliases};

/// Every generated file by name. A filename can only be registered once.
#[derive(Debug, Clone, Default)]
pub struct ArtifactSet {
    files: IndexMap<String, String>,
}

impl ArtifactSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, filename: impl Into<String>, contents: impl Into<String>) -> Result<()> {
        let filename = filename.into();
        if self.files.contains_key(&filename) {
            return Err(CompileError::DuplicateArtifact { filename });
        }
        self.files.insert(filename, contents.into());
        Ok(())
    }

    pub fn extend(&mut self, other: ArtifactSet) -> Result<()> {
        for (filename, contents) in other.files {
            self.insert(filename, contents)?;
        }
        Ok(())
    }

    pub fn get(&self, filename: &str) -> Option<&str> {
        self.files.get(filename).map(String::as_str)
    }

    pub fn contains(&self, filename: &str) -> bool {
        self.files.contains_key(filename)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.files.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SceneMapEntry {
    pub id: String,
    pub name: String,
    pub symbol: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableMapEntry {
    pub symbol: String,
    pub id: String,
    pub name: String,
    pub is_local: bool,
    pub entity_type: String,
    pub entity_id: String,
    pub scene_id: String,
}

/// Result of compiling a project.
#[derive(Debug, Clone, Default)]
pub struct CompiledData {
    pub files: ArtifactSet,
    /// Scene symbol to scene identity, for debuggers.
    pub scene_map: BTreeMap<String, SceneMapEntry>,
    /// Variable alias to variable identity.
    pub variable_map: BTreeMap<String, VariableMapEntry>,
    /// Scene types the engine has to include, `LOGO` first when present.
    pub used_scene_type_ids: Vec<String>,
}

impl CompiledData {
    /// Writes sources under `src/data`, headers and includes under
    /// `include/data`, and the debugger maps under `build/`.
    pub fn write(&self, build_root: &Path) -> Result<usize> {
        let src = build_root.join("src").join("data");
        let include = build_root.join("include").join("data");
        let mut written = 0;
        for (filename, contents) in self.files.iter() {
            let dir = if filename.ends_with(".h") || filename.ends_with(".i") {
                &include
            } else {
                &src
            };
            let path = dir.join(filename);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .map_err(|e| CompileError::io_path("create directory", parent, e))?;
            }
            fs::write(&path, contents).map_err(|e| CompileError::io_path("write", &path, e))?;
            written += 1;
        }

        let build = build_root.join("build");
        fs::create_dir_all(&build).map_err(|e| CompileError::io_path("create directory", &build, e))?;
        write_json(&build.join("variable_map.json"), &self.variable_map)?;
        write_json(&build.join("scene_map.json"), &self.scene_map)?;
        debug!("wrote {} generated files to {}", written, build_root.display());
        Ok(written)
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    fs::write(path, text).map_err(|e| CompileError::io_path("write", path, e))
}
