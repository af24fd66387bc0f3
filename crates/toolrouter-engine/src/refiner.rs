use anyhow::{Context, Result};
use regex::Regex;
use toolrouter_contracts::tools::RefinerRules;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Refinement {
    /// Input with filler words removed and whitespace collapsed.
    pub cleaned: String,
    /// First matching refiner category, if any.
    pub category: Option<String>,
    pub refined: String,
}

/// Rewrites raw requests into imperative prompts.
#[derive(Debug, Clone)]
pub struct Refiner {
    rules: RefinerRules,
    filler: Option<Regex>,
}

impl Refiner {
    pub fn new(rules: RefinerRules) -> Result<Self> {
        let filler = match filler_pattern(&rules.filler_words) {
            Some(pattern) => Some(
                Regex::new(&pattern)
                    .with_context(|| format!("invalid filler word pattern {pattern}"))?,
            ),
            None => None,
        };
        Ok(Self { rules, filler })
    }

    pub fn refine(&self, input: &str) -> String {
        self.refine_detailed(input).refined
    }

    pub fn refine_detailed(&self, input: &str) -> Refinement {
        let stripped = match &self.filler {
            Some(filler) => filler.replace_all(input, "").into_owned(),
            None => input.to_string(),
        };
        let cleaned = collapse_whitespace(&stripped);
        let lowered = cleaned.to_lowercase();

        let category = self
            .rules
            .categories
            .iter()
            .find(|category| category.detects(&lowered));

        let mut refined = cleaned.clone();
        if let Some(category) = category {
            for enrichment in &category.enrichments {
                if enrichment.applies(&lowered) {
                    refined.push_str(&enrichment.append);
                }
            }
        }

        if !self.is_actionable(&refined) {
            let verb = self.rules.verb_for(&lowered);
            refined = format!("{verb} {refined}").trim().to_string();
        }

        Refinement {
            cleaned,
            category: category.map(|category| category.name.clone()),
            refined,
        }
    }

    fn is_actionable(&self, text: &str) -> bool {
        let lowered = text.to_lowercase();
        self.rules
            .actionable_verbs
            .iter()
            .any(|verb| !verb.is_empty() && lowered.starts_with(&verb.to_lowercase()))
    }
}

/// `(?i)\b(?:um|you\s+know|...)\b` with ASCII word boundaries, or `None`
/// when there is nothing to strip.
fn filler_pattern(words: &[String]) -> Option<String> {
    let alternatives: Vec<String> = words
        .iter()
        .filter(|word| !word.trim().is_empty())
        .map(|word| {
            word.split_whitespace()
                .map(regex::escape)
                .collect::<Vec<String>>()
                .join(r"\s+")
        })
        .collect();
    if alternatives.is_empty() {
        return None;
    }
    Some(format!(
        r"(?i)(?-u:\b)(?:{})(?-u:\b)",
        alternatives.join("|")
    ))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<&str>>().join(" ")
}
