//! `{{variable}}` templates for widget copy.
//!
//! Validation runs when a widget is saved and reports every problem it
//! finds. Rendering runs on every product view and never fails: anything it
//! cannot substitute is left in the output exactly as written.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The fixed placeholder vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateVariable {
    ProductName,
    Price,
    TotalSales,
    Country,
    CustomerName,
    RecentSaleTime,
}

impl TemplateVariable {
    /// The full placeholder vocabulary.
    pub const ALL: [TemplateVariable; 6] = [
        TemplateVariable::ProductName,
        TemplateVariable::Price,
        TemplateVariable::TotalSales,
        TemplateVariable::Country,
        TemplateVariable::CustomerName,
        TemplateVariable::RecentSaleTime,
    ];

    /// Name used between the braces.
    pub fn key(&self) -> &'static str {
        match self {
            TemplateVariable::ProductName => "product_name",
            TemplateVariable::Price => "price",
            TemplateVariable::TotalSales => "total_sales",
            TemplateVariable::Country => "country",
            TemplateVariable::CustomerName => "customer_name",
            TemplateVariable::RecentSaleTime => "recent_sale_time",
        }
    }

    /// Look up a placeholder name. Names are exact and case-sensitive.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.key() == key)
    }

    /// The placeholder as an author would type it, e.g. `{{price}}`.
    pub fn placeholder(&self) -> String {
        format!("{{{{{}}}}}", self.key())
    }
}

impl fmt::Display for TemplateVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A template problem. Several can be reported for one string.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum TemplateError {
    #[error("Unmatched template braces")]
    UnmatchedBraces,

    #[error("Empty template variables not allowed")]
    EmptyPlaceholder,

    #[error("Nested or malformed template braces")]
    MalformedBraces,

    #[error("Invalid variables: {}", .names.join(", "))]
    UnknownVariable { names: Vec<String> },
}

impl TemplateError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            TemplateError::UnmatchedBraces => "unmatched_braces",
            TemplateError::EmptyPlaceholder => "empty_placeholder",
            TemplateError::MalformedBraces => "malformed_braces",
            TemplateError::UnknownVariable { .. } => "unknown_variable",
        }
    }
}

/// Values substituted into a template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateContext {
    values: BTreeMap<TemplateVariable, String>,
}

impl TemplateContext {
    /// Empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, variable: TemplateVariable, value: impl Into<String>) -> Self {
        self.insert(variable, value);
        self
    }

    /// Set or replace one value.
    pub fn insert(&mut self, variable: TemplateVariable, value: impl Into<String>) {
        self.values.insert(variable, value.into());
    }

    /// Value for `variable`, if any.
    pub fn get(&self, variable: TemplateVariable) -> Option<&str> {
        self.values.get(&variable).map(String::as_str)
    }

    /// True when no variable has a value.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Build from loosely-typed pairs. Keys outside the vocabulary are dropped.
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: AsRef<str>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let values = pairs
            .into_iter()
            .filter_map(|(k, v)| TemplateVariable::from_key(k.as_ref()).map(|var| (var, v.into())))
            .collect();
        Self { values }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker {
    Open,
    Close,
}

/// `{{` and `}}` markers in order, scanned left to right without overlap.
fn markers(template: &str) -> Vec<Marker> {
    let bytes = template.as_bytes();
    let mut found = Vec::new();
    let mut i = 0;
    while i + 1 < bytes.len() {
        match (bytes[i], bytes[i + 1]) {
            (b'{', b'{') => {
                found.push(Marker::Open);
                i += 2;
            }
            (b'}', b'}') => {
                found.push(Marker::Close);
                i += 2;
            }
            _ => i += 1,
        }
    }
    found
}

fn has_malformed_nesting(markers: &[Marker]) -> bool {
    let mut open = false;
    for marker in markers {
        match (marker, open) {
            (Marker::Open, true) | (Marker::Close, false) => return true,
            (Marker::Open, false) => open = true,
            (Marker::Close, true) => open = false,
        }
    }
    false
}

fn empty_placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{\s*\}\}").expect("static regex"))
}

fn named_placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{([^}]+)\}\}").expect("static regex"))
}

fn render_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{\s*([^{}]*?)\s*\}\}").expect("static regex"))
}

/// Check a template. Returns every applicable error; empty means valid.
pub fn validate(template: &str) -> Vec<TemplateError> {
    let mut errors = Vec::new();
    if template.is_empty() {
        return errors;
    }

    let markers = markers(template);
    let opens = markers.iter().filter(|m| **m == Marker::Open).count();
    let closes = markers.len() - opens;

    if opens != closes {
        errors.push(TemplateError::UnmatchedBraces);
    }

    if empty_placeholder_re().is_match(template) {
        errors.push(TemplateError::EmptyPlaceholder);
    }

    if has_malformed_nesting(&markers) {
        errors.push(TemplateError::MalformedBraces);
    }

    let mut unknown: Vec<String> = Vec::new();
    for caps in named_placeholder_re().captures_iter(template) {
        let name = caps[1].trim();
        if name.is_empty() || TemplateVariable::from_key(name).is_some() {
            continue;
        }
        if !unknown.iter().any(|n| n == name) {
            unknown.push(name.to_string());
        }
    }
    if !unknown.is_empty() {
        errors.push(TemplateError::UnknownVariable { names: unknown });
    }

    errors
}

/// Shorthand for `validate(template).is_empty()`.
pub fn is_valid(template: &str) -> bool {
    validate(template).is_empty()
}

/// Substitute known variables present in `context`; leave everything else verbatim.
pub fn render(template: &str, context: &TemplateContext) -> String {
    if context.is_empty() {
        return template.to_string();
    }

    render_re()
        .replace_all(template, |caps: &Captures| {
            TemplateVariable::from_key(&caps[1])
                .and_then(|var| context.get(var))
                .map(str::to_string)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Names of vocabulary variables referenced by a template.
pub fn referenced_variables(template: &str) -> Vec<TemplateVariable> {
    let mut vars: Vec<TemplateVariable> = render_re()
        .captures_iter(template)
        .filter_map(|caps| TemplateVariable::from_key(&caps[1]))
        .collect();
    vars.sort();
    vars.dedup();
    vars
}
