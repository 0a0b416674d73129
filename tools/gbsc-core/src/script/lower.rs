use serde_json::{Map, Value};

use super::{CompiledScript, ScriptCompiler, ScriptFlags};
use crate::hash::StableHasher;
use crate::platform::MAX_NESTED_SCRIPT_DEPTH;
use crate::project::{CustomEvent, ScriptEvent, commands};
use crate::schema::ArgKind;
use crate::symbols::to_c_identifier;
use crate::walk::{bind_custom_event_args, bound_args};

const INDENT: &str = "        ";

/// Body of one listing with its own local label counter.
#[derive(Default)]
struct Listing {
    lines: Vec<String>,
    labels: usize,
}

impl Listing {
    fn label(&mut self) -> usize {
        self.labels += 1;
        self.labels
    }

    fn place(&mut self, label: usize) {
        self.lines.push(format!("{}$:", label));
    }

    fn op(&mut self, text: impl AsRef<str>) {
        self.lines.push(format!("{}{}", INDENT, text.as_ref()));
    }

    fn comment(&mut self, text: impl AsRef<str>) {
        self.lines.push(format!("{}; {}", INDENT, text.as_ref()));
    }
}

fn render(symbol: &str, lock: bool, listing: Listing) -> String {
    let mut lines = vec![
        format!(".module {}", symbol),
        String::new(),
        ".include \"vm.i\"".to_string(),
        ".include \"data/game_globals.i\"".to_string(),
        String::new(),
        ".area _CODE_255".to_string(),
        String::new(),
        format!("___bank_{} = 255", symbol),
        format!(".globl ___bank_{}", symbol),
        String::new(),
        format!("_{}::", symbol),
    ];
    if lock {
        lines.push(format!("{}VM_LOCK", INDENT));
    }
    lines.extend(listing.lines);
    lines.push(String::new());
    lines.join("\n")
}

/// C declarations for a compiled script.
pub fn script_header(symbol: &str) -> String {
    let guard = format!("SCRIPT_{}_H", symbol.to_uppercase());
    format!(
        "#ifndef {guard}\n#define {guard}\n\n// Script {symbol}\n\n#include \"gbs_types.h\"\n#include \"bankdata.h\"\n\nBANKREF_EXTERN({symbol})\nextern const unsigned char {symbol}[];\n\n#endif\n"
    )
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

impl ScriptCompiler<'_> {
    pub(super) fn lower_entity_script(
        &mut self,
        symbol: &str,
        events: &[ScriptEvent],
        flags: ScriptFlags,
    ) -> String {
        let mut listing = Listing::default();
        let loop_label = flags.looped.then(|| listing.label());
        if let Some(label) = loop_label {
            listing.place(label);
        }
        self.lower_events(&mut listing, events, 0);
        if let Some(label) = loop_label {
            listing.op("VM_IDLE");
            listing.op(format!("VM_JUMP {}$", label));
        }
        listing.op("VM_STOP");
        render(symbol, flags.lock, listing)
    }

    fn lower_events(&mut self, out: &mut Listing, events: &[ScriptEvent], depth: usize) {
        for event in events.iter().filter(|e| !e.is_comment()) {
            self.lower_event(out, event, depth);
        }
    }

    fn lower_event(&mut self, out: &mut Listing, event: &ScriptEvent, depth: usize) {
        match event.command.as_str() {
            commands::EVENT_END => {}
            commands::INTERNAL_SET_CONTEXT => {
                let part = |key| event.arg_str(key).unwrap_or_default();
                out.comment(format!(
                    "{} {} {}",
                    part("entityType"),
                    part("entityId"),
                    part("scriptKey")
                ));
            }
            commands::INTERNAL_SET_SPRITE_MODE => {
                let mode = match event.arg_str("mode") {
                    Some("8x8") => ".MODE_8X8",
                    _ => ".MODE_8X16",
                };
                out.op(format!("VM_SET_SPRITE_MODE {}", mode));
            }
            commands::INTERNAL_IF_PARAM => {
                let parameter = event.args.get("parameter").and_then(Value::as_u64).unwrap_or(0);
                let value = event.args.get("value").and_then(Value::as_u64).unwrap_or(0);
                let body = out.label();
                let end = out.label();
                out.op(format!(
                    "VM_IF_CONST .EQ, .PARAM{}, {}, {}$, 0",
                    parameter, value, body
                ));
                out.op(format!("VM_JUMP {}$", end));
                out.place(body);
                if let Some(branch) = event.children.get("true") {
                    self.lower_events(out, branch, depth);
                }
                out.place(end);
            }
            commands::EVENT_FADE_IN => {
                let speed = event.args.get("speed").and_then(Value::as_u64).unwrap_or(1);
                out.op(format!("VM_FADE_IN {}", speed));
            }
            commands::EVENT_CALL_CUSTOM_EVENT => self.lower_custom_call(out, event, depth),
            _ => self.lower_generic(out, event, depth),
        }
    }

    fn lower_generic(&mut self, out: &mut Listing, event: &ScriptEvent, depth: usize) {
        let args: Vec<String> = event
            .args
            .iter()
            .filter(|(key, _)| !key.starts_with("__"))
            .map(|(key, value)| format!("{}={}", key, self.render_arg(&event.command, key, value)))
            .collect();
        out.comment(&event.command);
        out.op(format!("VM_EVENT {}", args.len() + 1));
        out.op(format!(".asciz \"{}\"", escape(&event.command)));
        for arg in &args {
            out.op(format!(".asciz \"{}\"", escape(arg)));
        }

        if event.children.is_empty() {
            return;
        }
        let end = out.label();
        let branches: Vec<(&String, &Vec<ScriptEvent>, usize)> = event
            .children
            .iter()
            .map(|(name, body)| (name, body, out.label()))
            .collect();
        for (name, _, label) in &branches {
            out.op(format!("VM_BRANCH {}$ ; {}", label, name));
        }
        out.op(format!("VM_JUMP {}$", end));
        for (_, body, label) in branches {
            out.place(label);
            self.lower_events(out, body, depth);
            out.op(format!("VM_JUMP {}$", end));
        }
        out.place(end);
    }

    fn render_arg(&self, command: &str, key: &str, value: &Value) -> String {
        let kind = self.ctx.schema.arg_kind(command, key);
        match (kind, value) {
            (Some(ArgKind::Variable), Value::String(id)) => self.variable_alias(id),
            (Some(ArgKind::Variable), Value::Number(n)) => self.variable_alias(&n.to_string()),
            (Some(kind), Value::String(id)) => self
                .ctx
                .precompiled
                .symbol_for(kind, id)
                .map_or_else(|| id.clone(), |symbol| format!("_{}", symbol)),
            (_, Value::String(text)) => text.clone(),
            (_, Value::Object(map)) if map.get("type").and_then(Value::as_str) == Some("variable") => {
                match map.get("value") {
                    Some(Value::String(id)) => self.variable_alias(id),
                    Some(other) => self.variable_alias(&other.to_string()),
                    None => value.to_string(),
                }
            }
            (_, other) => other.to_string(),
        }
    }

    fn variable_alias(&self, id: &str) -> String {
        match self.ctx.variables.get(id) {
            Some(alias) => alias.clone(),
            None => format!(".LOCAL_{}", to_c_identifier(id).to_uppercase()),
        }
    }

    fn lower_custom_call(&mut self, out: &mut Listing, event: &ScriptEvent, depth: usize) {
        let lookup = self.ctx.custom_events;
        let Some(id) = event.arg_str("customEventId") else {
            return;
        };
        let Some(custom) = lookup.get(id).copied() else {
            self.reporter
                .warn(format!("Script references a missing custom event '{}'", id));
            return;
        };
        if depth >= MAX_NESTED_SCRIPT_DEPTH {
            self.reporter.warn(format!(
                "Custom script '{}' is nested more than {} levels deep and was skipped",
                custom.name, MAX_NESTED_SCRIPT_DEPTH
            ));
            return;
        }
        let symbol = self.custom_script_symbol(custom, &event.args, depth);
        out.op(format!("VM_CALL_FAR ___bank_{0}, _{0}", symbol));
    }

    /// Compiles the body of `custom` for the arguments bound at this call
    /// site, or returns the symbol of an earlier identical compilation.
    fn custom_script_symbol(
        &mut self,
        custom: &CustomEvent,
        call_args: &Map<String, Value>,
        depth: usize,
    ) -> String {
        let bound = bound_args(call_args);
        let mut hasher = StableHasher::new("custom-call");
        hasher.str(&custom.id).value(&Value::Object(bound.clone()));
        let key = hasher.finish();
        if let Some(symbol) = self.memo.get(&key) {
            return symbol.clone();
        }

        let symbol = self.symbols.custom_script();
        // Registered before the body is lowered so recursive calls resolve to it.
        self.memo.insert(key, symbol.clone());

        let body = bind_custom_event_args(&custom.script, &bound);
        let mut listing = Listing::default();
        listing.comment(format!("Custom script {}", custom.name));
        self.lower_events(&mut listing, &body, depth + 1);
        listing.op("VM_RET_FAR");
        self.compiled.push(CompiledScript {
            symbol: symbol.clone(),
            entity_id: custom.id.clone(),
            script_key: "script".to_string(),
            text: render(&symbol, false, listing),
        });
        symbol
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_declares_bank_and_data() {
        let header = script_header("scene_1_init");
        assert!(header.contains("#ifndef SCRIPT_SCENE_1_INIT_H"));
        assert!(header.contains("BANKREF_EXTERN(scene_1_init)"));
        assert!(header.contains("extern const unsigned char scene_1_init[];"));
    }

    #[test]
    fn listing_labels_are_local_and_increasing() {
        let mut listing = Listing::default();
        let a = listing.label();
        let b = listing.label();
        listing.place(b);
        assert_eq!((a, b), (1, 2));
        let text = render("s", true, listing);
        assert!(text.starts_with(".module s\n"));
        assert!(text.contains("_s::\n        VM_LOCK\n2$:"));
    }

    #[test]
    fn strings_are_escaped() {
        assert_eq!(escape("say \"hi\""), "say \\\"hi\\\"");
    }
}
