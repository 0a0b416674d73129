use crate::make::BuildType;

const INVALID_FILENAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];
const ROM_EXTENSIONS: [&str; 4] = [".gb", ".gbc", ".pocket", ".gba"];

fn strip_invalid(name: &str) -> String {
    name.chars()
        .filter(|c| !INVALID_FILENAME_CHARS.contains(c) && !c.is_control())
        .collect()
}

/// Lowercase alphanumeric runs joined with `-`.
fn slug(name: &str) -> String {
    name.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

fn strip_rom_extension(stem: &str) -> &str {
    let lower = stem.to_ascii_lowercase();
    ROM_EXTENSIONS
        .iter()
        .find(|ext| lower.ends_with(*ext))
        .map_or(stem, |ext| &stem[..stem.len() - ext.len()])
}

/// File stem of the ROM: the override name when it has any usable
/// characters, else a slug of the project name, else `game`.
pub fn rom_file_stem(override_name: &str, project_name: &str) -> String {
    let source = if strip_invalid(override_name).trim().is_empty() {
        slug(project_name.trim())
    } else {
        override_name.to_string()
    };
    let cleaned = strip_invalid(&source);
    let stem = strip_rom_extension(cleaned.trim()).trim();
    if stem.chars().all(|c| c == '-') {
        return "game".to_string();
    }
    stem.to_string()
}

pub fn rom_filename(override_name: &str, project_name: &str, color_only: bool, build_type: BuildType) -> String {
    let extension = match build_type {
        BuildType::Gba => "gba",
        BuildType::Pocket => "pocket",
        BuildType::Rom | BuildType::Web if color_only => "gbc",
        BuildType::Rom | BuildType::Web => "gb",
    };
    format!("{}.{}", rom_file_stem(override_name, project_name), extension)
}
