//! Resolution strategies for free-form voice targets.
//!
//! A spoken target such as "course title" is turned into an ordered ladder of
//! [`Selector`]s. The [`crate::Locator`] walks the ladder against the live UI
//! tree and stops at the first hit, so the order here is the precedence order.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Element-class hint attached to every resolution request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Tab,
    Button,
    Input,
    Dropdown,
    Form,
    Modal,
    List,
    ListItem,
    Menu,
    MenuItem,
    /// Any tagged element, regardless of role.
    Any,
}

impl ElementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Tab => "tab",
            ElementKind::Button => "button",
            ElementKind::Input => "input",
            ElementKind::Dropdown => "dropdown",
            ElementKind::Form => "form",
            ElementKind::Modal => "modal",
            ElementKind::List => "list",
            ElementKind::ListItem => "list item",
            ElementKind::Menu => "menu",
            ElementKind::MenuItem => "menu item",
            ElementKind::Any => "element",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One rung of the resolution ladder.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    /// Synonym found in the class alias table, resolved to its canonical id
    Alias { alias: String, canonical: String },
    /// Exact stable identifier
    Id(String),
    /// Exact stable identifier built from the class prefix convention
    PrefixedId { prefix: String, id: String },
    /// Class candidate whose stable identifier contains the fragment
    IdContains(String),
    /// Visible text, accessible label or placeholder containing the phrase
    Text(String),
    /// Any tagged element whose stable identifier contains every word
    Words(Vec<String>),
}

impl Selector {
    /// Short strategy name, used in logs and resolution reports.
    pub fn strategy(&self) -> &'static str {
        match self {
            Selector::Alias { .. } => "alias",
            Selector::Id(_) => "id",
            Selector::PrefixedId { .. } => "prefixed_id",
            Selector::IdContains(_) => "id_contains",
            Selector::Text(_) => "text",
            Selector::Words(_) => "words",
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Alias { alias, canonical } => write!(f, "alias:{alias}=>{canonical}"),
            Selector::Id(id) => write!(f, "id:{id}"),
            Selector::PrefixedId { prefix, id } => write!(f, "id:{prefix}{id}"),
            Selector::IdContains(fragment) => write!(f, "id*={fragment}"),
            Selector::Text(text) => write!(f, "text:{text}"),
            Selector::Words(words) => write!(f, "words:{}", words.join("+")),
        }
    }
}

/// A target after normalization: lowercased and trimmed, plus its hyphen-joined form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedTarget {
    pub normalized: String,
    pub hyphenated: String,
}

impl NormalizedTarget {
    pub fn new(raw: &str) -> Self {
        let normalized = raw.trim().to_lowercase();
        let hyphenated = normalized.split_whitespace().collect::<Vec<_>>().join("-");
        Self {
            normalized,
            hyphenated,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.normalized.is_empty()
    }

    pub fn words(&self) -> Vec<String> {
        self.normalized
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }
}

/// Build the ordered selector ladder for `raw` as an element of `kind`.
///
/// `aliases` is the class alias table and `prefix` the class id prefix, both
/// taken from configuration. Kinds without an alias table or prefix simply
/// skip those rungs.
pub fn selectors_for(
    raw: &str,
    aliases: Option<&HashMap<String, String>>,
    prefix: Option<&str>,
) -> Vec<Selector> {
    let target = NormalizedTarget::new(raw);
    if target.is_empty() {
        return Vec::new();
    }

    let mut ladder = Vec::with_capacity(6);

    if let Some(canonical) = aliases.and_then(|table| {
        table
            .get(&target.normalized)
            .or_else(|| table.get(&target.hyphenated))
    }) {
        ladder.push(Selector::Alias {
            alias: target.normalized.clone(),
            canonical: canonical.clone(),
        });
    }

    ladder.push(Selector::Id(target.hyphenated.clone()));

    if let Some(prefix) = prefix.filter(|p| !p.is_empty()) {
        if !target.hyphenated.starts_with(prefix) {
            ladder.push(Selector::PrefixedId {
                prefix: prefix.to_string(),
                id: target.hyphenated.clone(),
            });
        }
    }

    ladder.push(Selector::IdContains(target.hyphenated.clone()));
    ladder.push(Selector::Text(target.normalized.clone()));

    let words = target.words();
    if !words.is_empty() {
        ladder.push(Selector::Words(words));
    }

    ladder
}

static NUMERIC_ORDINAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(-?\d+)\s*(?:st|nd|rd|th|º|ª|°|o|a)?$").expect("valid regex"));

/// Parse a spoken position ("first", "tercera", "last", "2nd", "4") into a
/// zero-based index. Negative results count from the end (`-1` is the last).
///
/// Plain numbers are 1-based, as people count them; negative numbers are
/// passed through unchanged.
pub fn parse_ordinal(input: &str) -> Option<i64> {
    let cleaned = strip_filler(&input.trim().to_lowercase());
    if cleaned.is_empty() {
        return None;
    }

    let word_index = match cleaned.as_str() {
        "first" | "primero" | "primera" | "primer" => Some(0),
        "second" | "segundo" | "segunda" => Some(1),
        "third" | "tercero" | "tercera" | "tercer" => Some(2),
        "fourth" | "cuarto" | "cuarta" => Some(3),
        "fifth" | "quinto" | "quinta" => Some(4),
        "sixth" | "sexto" | "sexta" => Some(5),
        "seventh" | "séptimo" | "séptima" | "septimo" | "septima" => Some(6),
        "eighth" | "octavo" | "octava" => Some(7),
        "ninth" | "noveno" | "novena" => Some(8),
        "tenth" | "décimo" | "décima" | "decimo" | "decima" => Some(9),
        "last" | "último" | "última" | "ultimo" | "ultima" => Some(-1),
        "second to last" | "second last" | "penultimate" | "penúltimo" | "penúltima"
        | "penultimo" | "penultima" => Some(-2),
        _ => None,
    };
    if word_index.is_some() {
        return word_index;
    }

    let captures = NUMERIC_ORDINAL.captures(&cleaned)?;
    let number: i64 = captures.get(1)?.as_str().parse().ok()?;
    match number {
        n if n > 0 => Some(n - 1),
        n if n < 0 => Some(n),
        _ => None,
    }
}

fn strip_filler(input: &str) -> String {
    const LEADING: [&str; 6] = ["the ", "el ", "la ", "number ", "número ", "option "];
    const TRAILING: [&str; 5] = [" one", " option", " item", " opción", " elemento"];

    let mut s = input.trim().to_string();
    for prefix in LEADING {
        if let Some(rest) = s.strip_prefix(prefix) {
            s = rest.trim().to_string();
        }
    }
    for suffix in TRAILING {
        if let Some(rest) = s.strip_suffix(suffix) {
            s = rest.trim().to_string();
        }
    }
    s
}

/// Resolve a possibly negative index against a collection of `len` items.
pub fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let resolved = if index < 0 { len + index } else { index };
    (0..len)
        .contains(&resolved)
        .then(|| usize::try_from(resolved).ok())
        .flatten()
}
