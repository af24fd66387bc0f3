use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::registry::{ToolSpec, ToolTable};

const DEFAULT_ROUTING_TABLE_JSON: &str = include_str!("../../resources/default_routing.json");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackRule {
    pub tool: String,
    pub confidence: f64,
    pub reasoning: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringRules {
    pub exact_match_weight: u32,
    pub partial_match_weight: u32,
    pub confidence_per_point: f64,
    pub clarity_bonus: f64,
    pub clarity_min_chars: usize,
    pub clarity_min_weight: u32,
    pub min_confidence: f64,
    pub fallback: FallbackRule,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enrichment {
    pub append: String,
    #[serde(default)]
    pub when_any: Vec<String>,
    #[serde(default)]
    pub unless_any: Vec<String>,
}

impl Enrichment {
    /// An empty `when_any` means the qualifier is always wanted.
    pub fn applies(&self, haystack: &str) -> bool {
        let wanted = self.when_any.is_empty() || contains_any(haystack, &self.when_any);
        wanted && !contains_any(haystack, &self.unless_any)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefinerCategory {
    pub name: String,
    pub keywords: Vec<String>,
    pub verb: String,
    #[serde(default)]
    pub enrichments: Vec<Enrichment>,
}

impl RefinerCategory {
    pub fn detects(&self, haystack: &str) -> bool {
        contains_any(haystack, &self.keywords)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefinerRules {
    pub filler_words: Vec<String>,
    pub actionable_verbs: Vec<String>,
    pub default_verb: String,
    pub categories: Vec<RefinerCategory>,
    /// Category names checked, in order, when choosing the leading verb.
    /// Empty means `categories` order.
    #[serde(default)]
    pub verb_priority: Vec<String>,
}

impl RefinerRules {
    /// Leading verb for `haystack`: the first detected category in
    /// `verb_priority` order, else `default_verb`.
    pub fn verb_for(&self, haystack: &str) -> &str {
        let detected = if self.verb_priority.is_empty() {
            self.categories
                .iter()
                .find(|category| category.detects(haystack))
        } else {
            self.verb_priority.iter().find_map(|name| {
                self.categories
                    .iter()
                    .find(|category| &category.name == name && category.detects(haystack))
            })
        };
        detected
            .map(|category| category.verb.as_str())
            .unwrap_or(self.default_verb.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RoutingTableRows {
    generic_version_label: String,
    tools: Vec<ToolSpec>,
    scoring: ScoringRules,
    refiner: RefinerRules,
}

impl RoutingTableRows {
    /// Matching runs against lowercased prompts, so every matcher list is
    /// stored lowercased.
    fn lowercase_matchers(&mut self) {
        for tool in &mut self.tools {
            lowercase_all(&mut tool.keywords);
            for rule in &mut tool.parameters {
                for when in &mut rule.when {
                    lowercase_all(&mut when.any);
                }
            }
        }
        let refiner = &mut self.refiner;
        lowercase_all(&mut refiner.filler_words);
        lowercase_all(&mut refiner.actionable_verbs);
        for category in &mut refiner.categories {
            lowercase_all(&mut category.keywords);
            for enrichment in &mut category.enrichments {
                lowercase_all(&mut enrichment.when_any);
                lowercase_all(&mut enrichment.unless_any);
            }
        }
    }
}

/// Keyword lists, weighting constants and refiner rules that drive routing.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingTable {
    pub tools: ToolTable,
    pub scoring: ScoringRules,
    pub refiner: RefinerRules,
    pub generic_version_label: String,
}

impl RoutingTable {
    pub fn builtin() -> Result<Self> {
        Self::from_json(DEFAULT_ROUTING_TABLE_JSON)
    }

    /// Built-in table with the override file at `override_path` merged on
    /// top. A missing override file is not an error.
    pub fn load(override_path: Option<&Path>) -> Result<Self> {
        let mut merged: Value = serde_json::from_str(DEFAULT_ROUTING_TABLE_JSON)
            .context("built-in routing table is not valid JSON")?;
        if let Some(path) = override_path.filter(|path| path.exists()) {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed reading {}", path.display()))?;
            let overlay: Value = serde_json::from_str(&raw).with_context(|| {
                format!("routing override {} is not valid JSON", path.display())
            })?;
            merge_routing_rows(&mut merged, overlay);
        }
        Self::from_value(merged)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(raw).context("routing table is not valid JSON")?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        let mut rows: RoutingTableRows =
            serde_json::from_value(value).context("routing table has an unexpected shape")?;
        rows.lowercase_matchers();
        let table = Self {
            tools: ToolTable::new(rows.tools)?,
            scoring: rows.scoring,
            refiner: rows.refiner,
            generic_version_label: rows.generic_version_label,
        };
        table.validate()?;
        Ok(table)
    }

    fn validate(&self) -> Result<()> {
        if self.tools.is_empty() {
            bail!("routing table declares no tools");
        }
        let fallback = &self.scoring.fallback;
        if !self.tools.contains(&fallback.tool) {
            bail!(
                "fallback tool '{}' is not declared (available: [{}])",
                fallback.tool,
                self.tools.names().join(", ")
            );
        }
        for (label, value) in [
            ("min_confidence", self.scoring.min_confidence),
            ("fallback confidence", fallback.confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                bail!("{label} must be within [0, 1], got {value}");
            }
        }
        if self.refiner.default_verb.trim().is_empty() {
            bail!("refiner default_verb must not be empty");
        }
        for name in &self.refiner.verb_priority {
            if !self
                .refiner
                .categories
                .iter()
                .any(|category| &category.name == name)
            {
                bail!("refiner verb_priority names unknown category '{name}'");
            }
        }
        Ok(())
    }
}

/// Merge an override document into a routing table document.
///
/// `tools` rows are matched by `name` and merged field by field; unknown
/// names are appended. Other objects merge recursively, everything else is
/// replaced.
pub fn merge_routing_rows(base: &mut Value, overlay: Value) {
    let (Some(base_obj), Value::Object(overlay_obj)) = (base.as_object_mut(), overlay) else {
        return;
    };
    for (key, overlay_value) in overlay_obj {
        if key == "tools" {
            if let (Some(Value::Array(base_rows)), Value::Array(overlay_rows)) =
                (base_obj.get_mut("tools"), &overlay_value)
            {
                merge_tool_rows(base_rows, overlay_rows.clone());
                continue;
            }
        }
        match base_obj.get_mut(&key) {
            Some(existing) if existing.is_object() && overlay_value.is_object() => {
                merge_objects(existing, overlay_value);
            }
            _ => {
                base_obj.insert(key, overlay_value);
            }
        }
    }
}

fn merge_tool_rows(base_rows: &mut Vec<Value>, overlay_rows: Vec<Value>) {
    for row in overlay_rows {
        let name = row.get("name").and_then(Value::as_str).map(str::to_string);
        let position = name.as_deref().and_then(|name| {
            base_rows
                .iter()
                .position(|candidate| candidate.get("name").and_then(Value::as_str) == Some(name))
        });
        match position {
            Some(idx) => merge_objects(&mut base_rows[idx], row),
            None => base_rows.push(row),
        }
    }
}

fn merge_objects(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) if existing.is_object() && value.is_object() => {
                        merge_objects(existing, value);
                    }
                    _ => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

fn lowercase_all(values: &mut [String]) {
    for value in values {
        *value = value.to_lowercase();
    }
}

fn contains_any(haystack: &str, needles: &[String]) -> bool {
    needles
        .iter()
        .any(|needle| !needle.is_empty() && haystack.contains(needle.as_str()))
}
