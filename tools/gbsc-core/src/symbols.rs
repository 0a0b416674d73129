use std::collections::HashSet;

/// Suffixes appended to an allocated symbol to name the data generated
/// alongside it.
pub const DERIVED_SUFFIXES: &[&str] = &[
    "tileset",
    "cgb_tileset",
    "bank2_tileset",
    "tilemap",
    "tilemap_attr",
    "bitmaps",
    "actors",
    "triggers",
    "sprites",
    "projectiles",
    "collisions",
];

/// Hands out C identifiers that are unique across one compilation.
///
/// Allocating a symbol also reserves every `<symbol>_<suffix>` name in
/// [`DERIVED_SUFFIXES`], and a name is only handed out when those are free
/// too.
#[derive(Debug, Default)]
pub struct SymbolAllocator {
    used: HashSet<String>,
    next_custom: usize,
}

impl SymbolAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `preferred` (or `fallback` when `preferred` sanitizes to
    /// nothing), suffixing `_<n>` until the name is free.
    pub fn allocate(&mut self, preferred: &str, fallback: &str) -> String {
        let mut base = to_c_identifier(preferred);
        if base.is_empty() {
            base = to_c_identifier(fallback);
        }
        if base.is_empty() {
            base = "symbol".to_string();
        }
        if self.claim(&base) {
            return base;
        }
        let mut n = 1;
        loop {
            let candidate = format!("{}_{}", base, n);
            if self.claim(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    fn claim(&mut self, symbol: &str) -> bool {
        let derived: Vec<String> = DERIVED_SUFFIXES
            .iter()
            .map(|suffix| format!("{}_{}", symbol, suffix))
            .collect();
        if self.used.contains(symbol) || derived.iter().any(|d| self.used.contains(d)) {
            return false;
        }
        self.used.insert(symbol.to_string());
        self.used.extend(derived);
        true
    }

    /// Name for the next compiled custom event body.
    pub fn custom_script(&mut self) -> String {
        loop {
            let candidate = format!("script_custom_{}", self.next_custom);
            self.next_custom += 1;
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
        }
    }

    pub fn is_used(&self, symbol: &str) -> bool {
        self.used.contains(symbol)
    }
}

/// Lowercase identifier made of `[a-z0-9_]`, never starting with a digit.
pub fn to_c_identifier(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            out.push(c);
        } else if !out.ends_with('_') && !out.is_empty() {
            out.push('_');
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert_str(0, "s_");
    }
    out
}
