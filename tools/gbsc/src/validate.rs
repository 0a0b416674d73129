use std::fs;
use std::path::Path;

use gbsc_core::{Reporter, TargetPlatform};

/// Value of `#define NAME <n>` or `NAME = <n>` in `text`.
fn read_number(text: &str, name: &str) -> Option<u64> {
    text.lines().find_map(|line| {
        let line = line.trim();
        let rest = line
            .strip_prefix("#define ")
            .map(str::trim_start)
            .unwrap_or(line)
            .strip_prefix(name)?;
        let value = rest.trim_start().trim_start_matches('=').trim();
        value.split_whitespace().next()?.parse().ok()
    })
}

/// Checks the ejected tree for limits the compiler cannot see on its own.
///
/// For the Game Boy engine this compares the VM heap against the number of
/// global variables the project uses. Problems are warnings.
pub fn validate_ejected_build(build_root: &Path, target: TargetPlatform, reporter: &Reporter) {
    if target.is_gba() {
        reporter.progress("Skipping VM validation for GBA build");
        return;
    }
    reporter.progress("Validating build files...");

    let vm_header = build_root.join("include/vm.h");
    let Ok(vm) = fs::read_to_string(&vm_header) else {
        reporter.warn(
            "VM header file (vm.h) not found. This may indicate an incomplete engine installation.",
        );
        return;
    };
    let globals = fs::read_to_string(build_root.join("include/data/game_globals.i")).unwrap_or_default();

    let heap = read_number(&vm, "VM_HEAP_SIZE");
    let vars = read_number(&globals, "MAX_GLOBAL_VARS");
    match (heap, vars) {
        (Some(heap), Some(vars)) if vars > heap => reporter.warn(format!(
            "Your project contains too many unique variables and will not work as expected. \
             VM_HEAP_SIZE defines the maximum amount of variables allowed {} but your project contained {} unique variables.",
            heap, vars
        )),
        (Some(_), Some(_)) => {}
        _ => reporter.warn(
            "Unable to read VM_HEAP_SIZE and MAX_GLOBAL_VARS to determine if project contains too many unique variables",
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(heap: &str, vars: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("include/data")).unwrap();
        fs::write(dir.path().join("include/vm.h"), format!("#define VM_HEAP_SIZE {}\n", heap)).unwrap();
        fs::write(
            dir.path().join("include/data/game_globals.i"),
            format!("VAR_SCORE = 0\nMAX_GLOBAL_VARS = {}\n", vars),
        )
        .unwrap();
        dir
    }

    #[test]
    fn reads_defines_and_assignments() {
        assert_eq!(read_number("#define VM_HEAP_SIZE 768\n", "VM_HEAP_SIZE"), Some(768));
        assert_eq!(read_number("X = 1\nMAX_GLOBAL_VARS = 12\n", "MAX_GLOBAL_VARS"), Some(12));
        assert_eq!(read_number("#define VM_HEAP_SIZE_X 1\n", "VM_HEAP_SIZE"), None);
    }

    #[test]
    fn too_many_variables_warns() {
        let dir = tree("8", "9");
        let reporter = Reporter::new();
        validate_ejected_build(dir.path(), TargetPlatform::Gb, &reporter);
        let warnings = reporter.warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("too many unique variables"));
    }

    #[test]
    fn within_heap_is_quiet() {
        let dir = tree("768", "3");
        let reporter = Reporter::new();
        validate_ejected_build(dir.path(), TargetPlatform::Gb, &reporter);
        assert!(reporter.warnings().is_empty());
    }

    #[test]
    fn unreadable_values_warn() {
        let dir = tree("lots", "3");
        let reporter = Reporter::new();
        validate_ejected_build(dir.path(), TargetPlatform::Pocket, &reporter);
        assert!(reporter.warnings()[0].starts_with("Unable to read"));
    }

    #[test]
    fn gba_builds_are_not_checked() {
        let dir = tempfile::tempdir().unwrap();
        let reporter = Reporter::new();
        validate_ejected_build(dir.path(), TargetPlatform::Gba, &reporter);
        assert!(reporter.warnings().is_empty());
    }
}
