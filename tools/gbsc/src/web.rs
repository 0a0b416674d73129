//! Browser bundle: the embedded web player plus the built ROM.

use std::fs;
use std::path::Path;

use gbsc_core::ProjectResources;
use gbsc_core::project::{ColorCorrection, ColorMode};
use gbsc_core::template::extract_web_player;
use serde_json::json;

use crate::error::{BuildError, Result};
use crate::fs_util::copy_file;

fn sanitize(text: &str) -> String {
    text.chars().filter(|c| !matches!(c, '"' | '<' | '>')).collect()
}

fn custom_controls(project: &ProjectResources) -> String {
    let s = &project.settings;
    json!({
        "up": s.custom_controls_up,
        "down": s.custom_controls_down,
        "left": s.custom_controls_left,
        "right": s.custom_controls_right,
        "a": s.custom_controls_a,
        "b": s.custom_controls_b,
        "start": s.custom_controls_start,
        "select": s.custom_controls_select,
    })
    .to_string()
}

/// Fills the placeholders of the player's `index.html`.
pub fn render_index(html: &str, project: &ProjectResources) -> String {
    let settings = &project.settings;
    let colors_head = if settings.color_mode == ColorMode::Mono {
        String::new()
    } else {
        format!(
            "<style type=\"text/css\"> body {{ background-color:#{}; }}</style>",
            settings.custom_colors_black
        )
    };
    html.replace("___PROJECT_NAME___", &sanitize(&project.metadata.name))
        .replace("___AUTHOR___", &sanitize(&project.metadata.author))
        .replace("___COLORS_HEAD___", &colors_head)
        .replace("___PROJECT_HEAD___", &settings.custom_head)
        .replace("___CUSTOM_CONTROLS___", &custom_controls(project))
}

/// Replaces the value after every `prefix` up to the first character
/// rejected by `in_value`.
fn rewrite_assignments(text: &str, prefix: &str, in_value: impl Fn(char) -> bool, value: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(at) = rest.find(prefix) {
        let after = &rest[at + prefix.len()..];
        let len = after.find(|c: char| !in_value(c)).unwrap_or(after.len());
        out.push_str(&rest[..at]);
        out.push_str(prefix);
        out.push_str(value);
        rest = &after[len..];
    }
    out.push_str(rest);
    out
}

/// Points the player script at the ROM and sets its colour curve.
pub fn render_script(js: &str, rom_filename: &str, color_correction: ColorCorrection) -> String {
    let curve = match color_correction {
        ColorCorrection::Default => "2",
        ColorCorrection::None => "0",
    };
    let js = rewrite_assignments(
        js,
        "ROM_FILENAME = \"",
        |c| c != '"',
        &format!("rom/{}", rom_filename),
    );
    rewrite_assignments(&js, "CGB_COLOR_CURVE = ", |c| c.is_ascii_digit(), curve)
}

/// Writes a playable web bundle for `rom` into `dest`.
pub fn export_web(project: &ProjectResources, rom: &Path, rom_filename: &str, dest: &Path) -> Result<()> {
    extract_web_player(dest)?;
    copy_file(rom, &dest.join("rom").join(rom_filename))?;

    let index = dest.join("index.html");
    let html = fs::read_to_string(&index).map_err(|e| BuildError::io_path("read", &index, e))?;
    fs::write(&index, render_index(&html, project)).map_err(|e| BuildError::io_path("write", &index, e))?;

    let script = dest.join("js").join("script.js");
    let js = fs::read_to_string(&script).map_err(|e| BuildError::io_path("read", &script, e))?;
    let js = render_script(&js, rom_filename, project.settings.color_correction);
    fs::write(&script, js).map_err(|e| BuildError::io_path("write", &script, e))?;
    Ok(())
}
