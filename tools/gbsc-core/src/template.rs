//! Engine template embedded in the compiler.
//!
//! The tarball carries three trees: `engine/` (C sources, headers, linker
//! script and `engine.json`), `assets/` (default project assets) and `web/`
//! (the browser player).

use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use serde::Deserialize;
use tar::Archive;

use crate::error::{CompileError, Result};
use crate::report::Reporter;

static ENGINE_TEMPLATE: &[u8] = include_bytes!("../engine-template.tar.gz");

fn archive() -> Archive<GzDecoder<Cursor<&'static [u8]>>> {
    Archive::new(GzDecoder::new(Cursor::new(ENGINE_TEMPLATE)))
}

fn template_error(e: std::io::Error) -> CompileError {
    CompileError::io("failed to read embedded engine template", e)
}

/// Unpacks every entry under `prefix/` into `dest`, returning the number of
/// files written.
fn extract_tree(prefix: &str, dest: &Path) -> Result<usize> {
    let mut archive = archive();
    let mut written = 0;
    for entry in archive.entries().map_err(template_error)? {
        let mut entry = entry.map_err(template_error)?;
        let entry_path = entry.path().map_err(template_error)?.into_owned();
        let Ok(relative) = entry_path.strip_prefix(prefix) else {
            continue;
        };
        if relative.as_os_str().is_empty() {
            continue;
        }
        let target = dest.join(relative);
        if entry.header().entry_type().is_dir() {
            std::fs::create_dir_all(&target)
                .map_err(|e| CompileError::io_path("create", &target, e))?;
            continue;
        }
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CompileError::io_path("create", parent, e))?;
        }
        entry
            .unpack(&target)
            .map_err(|e| CompileError::io_path("extract", &target, e))?;
        written += 1;
    }
    Ok(written)
}

/// Writes the engine sources into `build_root`.
pub fn eject_engine(build_root: &Path) -> Result<usize> {
    extract_tree("engine", build_root)
}

/// Writes the browser player into `dest`.
pub fn extract_web_player(dest: &Path) -> Result<usize> {
    extract_tree("web", dest)
}

/// Contents of a single template file, e.g. `assets/ui/frame.png`.
pub fn template_file(relative: &str) -> Result<Option<Vec<u8>>> {
    let mut archive = archive();
    for entry in archive.entries().map_err(template_error)? {
        let mut entry = entry.map_err(template_error)?;
        if entry.path().map_err(template_error)? != Path::new(relative) {
            continue;
        }
        let mut data = Vec::new();
        entry.read_to_end(&mut data).map_err(template_error)?;
        return Ok(Some(data));
    }
    Ok(None)
}

/// Makes sure `relative` exists inside the project, copying the template's
/// default when it is missing.
pub fn ensure_project_asset(
    project_root: &Path,
    relative: &str,
    reporter: &Reporter,
) -> Result<PathBuf> {
    let path = project_root.join(relative);
    if path.exists() {
        return Ok(path);
    }
    if let Some(data) = template_file(relative)? {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CompileError::io_path("create", parent, e))?;
        }
        std::fs::write(&path, data).map_err(|e| CompileError::io_path("write", &path, e))?;
        reporter.warn(format!(
            "{} was missing, copying default file to project assets",
            relative
        ));
    }
    Ok(path)
}

#[derive(Debug, Clone, Deserialize)]
pub struct SceneType {
    pub key: String,
    pub label: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EngineManifest {
    scene_types: Vec<SceneType>,
}

/// Scene types the engine implements, in engine order.
pub fn engine_scene_types() -> Result<Vec<SceneType>> {
    let Some(data) = template_file("engine/engine.json")? else {
        return Ok(Vec::new());
    };
    let manifest: EngineManifest = serde_json::from_slice(&data)?;
    Ok(manifest.scene_types)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ejects_engine_without_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let written = eject_engine(dir.path()).unwrap();
        assert!(written > 0);
        assert!(dir.path().join("include/vm.h").is_file());
        assert!(dir.path().join("src/core/main.c").is_file());
        assert!(!dir.path().join("engine").exists());
    }

    #[test]
    fn provisions_missing_assets_once() {
        let dir = tempfile::tempdir().unwrap();
        let reporter = Reporter::new();
        let path = ensure_project_asset(dir.path(), "assets/ui/frame.png", &reporter).unwrap();
        assert!(path.is_file());
        ensure_project_asset(dir.path(), "assets/ui/frame.png", &reporter).unwrap();
        assert_eq!(reporter.warnings().len(), 1);
    }

    #[test]
    fn engine_lists_logo_scene_type() {
        let types = engine_scene_types().unwrap();
        assert_eq!(types[0].key, "LOGO");
    }
}
