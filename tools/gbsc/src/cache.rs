//! Content-addressed store of compiled object files.
//!
//! Entries live at `<cache>/v1/<shard>/<key>.o` with a small JSON record
//! beside them. The key covers the source bytes, the headers visible to the
//! compiler, the toolchain environment signature, the compiler executable
//! and the compile arguments, so an entry is only ever reused for an
//! identical compilation. Entries are
//! written once through a temporary file and never modified afterwards.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use gbsc_core::{ContentKey, StableHasher};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::commands::CompileCommand;
use crate::env::BuildEnv;
use crate::error::{BuildError, Result};
use crate::fs_util::walk_files;

const CACHE_VERSION: &str = "v1";

#[derive(Debug, Serialize, Deserialize)]
struct EntryRecord {
    source: String,
    size: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub stored: usize,
}

fn cache_error(action: &str, path: &Path, e: impl std::fmt::Display) -> BuildError {
    BuildError::Cache(format!("failed to {} {}: {}", action, path.display(), e))
}

/// Digest of every file under `include/`.
pub fn headers_digest(build_root: &Path) -> Result<ContentKey> {
    let include = build_root.join("include");
    let mut hasher = StableHasher::new("include-tree");
    for file in walk_files(&include)? {
        let relative = file.strip_prefix(&include).unwrap_or(&file);
        let bytes = fs::read(&file).map_err(|e| BuildError::io_path("read", &file, e))?;
        hasher
            .str(&relative.to_string_lossy().replace('\\', "/"))
            .bytes(&bytes);
    }
    Ok(hasher.finish())
}

/// Identifies an installed compiler by its path, size and modification
/// time. A program that cannot be inspected hashes as missing.
pub fn compiler_fingerprint(program: &Path) -> ContentKey {
    let mut hasher = StableHasher::new("compiler");
    hasher.str(&program.to_string_lossy());
    match fs::metadata(program) {
        Ok(meta) => {
            let modified = meta
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map_or(0, |d| d.as_nanos() as u64);
            hasher.u64(meta.len()).u64(modified);
        }
        Err(_) => {
            hasher.str("missing");
        }
    }
    hasher.finish()
}

/// Cache keys for `commands`, in the same order.
pub fn cache_keys(build_root: &Path, commands: &[CompileCommand], env: &BuildEnv) -> Result<Vec<ContentKey>> {
    let signature = env.signature();
    let headers = headers_digest(build_root)?;
    let mut compilers: BTreeMap<&Path, ContentKey> = BTreeMap::new();
    commands
        .iter()
        .map(|command| {
            let source = build_root.join(&command.source);
            let bytes = fs::read(&source).map_err(|e| BuildError::io_path("read", &source, e))?;
            let program = command.tool.program.as_path();
            let compiler = compilers
                .entry(program)
                .or_insert_with(|| compiler_fingerprint(program));
            let mut hasher = StableHasher::new("object");
            hasher
                .bytes(&bytes)
                .str(signature.as_str())
                .str(headers.as_str())
                .str(compiler.as_str())
                .u64(command.tool.args.len() as u64);
            for arg in &command.tool.args {
                hasher.str(arg);
            }
            Ok(hasher.finish())
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct ObjectCache {
    root: PathBuf,
}

impl ObjectCache {
    pub fn new(dir: &Path) -> Self {
        ObjectCache {
            root: dir.join(CACHE_VERSION),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry(&self, key: &ContentKey) -> (PathBuf, PathBuf) {
        let dir = self.root.join(key.shard());
        (
            dir.join(format!("{}.o", key)),
            dir.join(format!("{}.json", key)),
        )
    }

    fn lookup(&self, key: &ContentKey) -> Option<PathBuf> {
        let (object, record) = self.entry(key);
        let record: EntryRecord = serde_json::from_slice(&fs::read(&record).ok()?).ok()?;
        let size = fs::metadata(&object).ok()?.len();
        if size != record.size {
            debug!("ignoring cache entry {} with unexpected size", key);
            return None;
        }
        Some(object)
    }

    /// Copies every cached object matching `keys` into the build tree.
    pub fn fetch(&self, build_root: &Path, commands: &[CompileCommand], keys: &[ContentKey]) -> Result<CacheStats> {
        let mut stats = CacheStats::default();
        for (command, key) in commands.iter().zip(keys) {
            if command.is_built(build_root) {
                continue;
            }
            let Some(cached) = self.lookup(key) else {
                stats.misses += 1;
                continue;
            };
            let target = build_root.join(&command.object);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| cache_error("create", parent, e))?;
            }
            fs::copy(&cached, &target).map_err(|e| cache_error("restore", &cached, e))?;
            stats.hits += 1;
        }
        info!("object cache: {} hits, {} misses", stats.hits, stats.misses);
        Ok(stats)
    }

    /// Adds every built object that has no entry yet.
    pub fn store(&self, build_root: &Path, commands: &[CompileCommand], keys: &[ContentKey]) -> Result<CacheStats> {
        let mut stats = CacheStats::default();
        for (command, key) in commands.iter().zip(keys) {
            let built = build_root.join(&command.object);
            if !built.is_file() || self.lookup(key).is_some() {
                continue;
            }
            let (object, record_path) = self.entry(key);
            if let Some(parent) = object.parent() {
                fs::create_dir_all(parent).map_err(|e| cache_error("create", parent, e))?;
            }
            let partial = object.with_extension(format!("o.{}.part", std::process::id()));
            let size = fs::copy(&built, &partial).map_err(|e| cache_error("write", &partial, e))?;
            fs::rename(&partial, &object).map_err(|e| cache_error("write", &object, e))?;

            let record = EntryRecord {
                source: command.source.display().to_string(),
                size,
            };
            let json = serde_json::to_vec_pretty(&record).map_err(|e| cache_error("encode", &record_path, e))?;
            fs::write(&record_path, json).map_err(|e| cache_error("write", &record_path, e))?;
            stats.stored += 1;
        }
        debug!("object cache: stored {} objects in {}", stats.stored, self.root.display());
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spawn::ToolCommand;

    fn command(build_root: &Path, name: &str, text: &str) -> CompileCommand {
        let source = PathBuf::from("src").join(format!("{}.c", name));
        fs::create_dir_all(build_root.join("src")).unwrap();
        fs::write(build_root.join(&source), text).unwrap();
        CompileCommand {
            object: PathBuf::from("obj").join(format!("{}.o", name)),
            tool: ToolCommand::new("compile", "cc").args(["-c", "-O2"]),
            source,
        }
    }

    #[test]
    fn stored_objects_are_restored_into_a_fresh_tree() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ObjectCache::new(&dir.path().join("cache"));
        let env = BuildEnv::new();

        let first = dir.path().join("first");
        let commands = vec![command(&first, "main", "int main;")];
        let keys = cache_keys(&first, &commands, &env).unwrap();
        fs::create_dir_all(first.join("obj")).unwrap();
        fs::write(first.join("obj/main.o"), b"\x7fOBJ").unwrap();
        assert_eq!(cache.store(&first, &commands, &keys).unwrap().stored, 1);
        assert_eq!(cache.store(&first, &commands, &keys).unwrap().stored, 0);

        let second = dir.path().join("second");
        let commands = vec![command(&second, "main", "int main;")];
        let keys = cache_keys(&second, &commands, &env).unwrap();
        let stats = cache.fetch(&second, &commands, &keys).unwrap();
        assert_eq!((stats.hits, stats.misses), (1, 0));
        assert_eq!(fs::read(second.join("obj/main.o")).unwrap(), b"\x7fOBJ");
    }

    #[test]
    fn any_input_change_misses() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let commands = vec![command(root, "main", "int a;")];
        let base = cache_keys(root, &commands, &BuildEnv::new()).unwrap();

        let mut env = BuildEnv::new();
        env.set("COLOR", "true");
        assert_ne!(base, cache_keys(root, &commands, &env).unwrap());

        fs::create_dir_all(root.join("include/data")).unwrap();
        fs::write(root.join("include/data/scene.h"), "#define X 1").unwrap();
        assert_ne!(base, cache_keys(root, &commands, &BuildEnv::new()).unwrap());

        let mut flagged = commands.clone();
        flagged[0].tool.args.push("-DDEBUG".into());
        let with_headers = cache_keys(root, &commands, &BuildEnv::new()).unwrap();
        assert_ne!(with_headers, cache_keys(root, &flagged, &BuildEnv::new()).unwrap());
    }

    #[test]
    fn replaced_compiler_misses() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("tree");
        let compiler = dir.path().join("bin/cc");
        fs::create_dir_all(compiler.parent().unwrap()).unwrap();
        fs::write(&compiler, "sdcc 4.3").unwrap();

        let mut commands = vec![command(&root, "main", "int a;")];
        commands[0].tool.program = compiler.clone();
        let base = cache_keys(&root, &commands, &BuildEnv::new()).unwrap();
        assert_eq!(base, cache_keys(&root, &commands, &BuildEnv::new()).unwrap());

        fs::write(&compiler, "sdcc 4.4.0").unwrap();
        assert_ne!(base, cache_keys(&root, &commands, &BuildEnv::new()).unwrap());

        commands[0].tool.program = dir.path().join("other/cc");
        assert_ne!(base, cache_keys(&root, &commands, &BuildEnv::new()).unwrap());
    }

    #[test]
    fn truncated_entries_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ObjectCache::new(&dir.path().join("cache"));
        let root = dir.path().join("tree");
        let commands = vec![command(&root, "vm", "void vm;")];
        let keys = cache_keys(&root, &commands, &BuildEnv::new()).unwrap();
        fs::create_dir_all(root.join("obj")).unwrap();
        fs::write(root.join("obj/vm.o"), b"object").unwrap();
        cache.store(&root, &commands, &keys).unwrap();

        let (object, _) = cache.entry(&keys[0]);
        fs::write(&object, b"obj").unwrap();
        fs::remove_file(root.join("obj/vm.o")).unwrap();
        let stats = cache.fetch(&root, &commands, &keys).unwrap();
        assert_eq!((stats.hits, stats.misses), (0, 1));
        assert!(!root.join("obj/vm.o").exists());
    }
}
