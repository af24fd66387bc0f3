use std::sync::Arc;

use anyhow::{Context, Result};
use regex::Regex;
use serde_json::Map;
use toolrouter_contracts::results::ClassificationResult;
use toolrouter_contracts::tools::{RoutingTable, ScoringRules, ToolSpec, ToolTable};

use crate::backends::ToolBackendRegistry;

/// Keyword weight of one tool for one prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolScore {
    pub tool: String,
    pub weight: u32,
    /// Keywords found in the prompt, in declaration order.
    pub matched: Vec<String>,
}

#[derive(Debug)]
struct CompiledKeyword {
    keyword: String,
    whole_word: Regex,
}

/// Picks a tool for a refined prompt by weighted keyword matching.
pub struct Classifier {
    tools: ToolTable,
    scoring: ScoringRules,
    keywords: Vec<(String, Vec<CompiledKeyword>)>,
    backends: Arc<ToolBackendRegistry>,
}

impl Classifier {
    pub fn new(table: &RoutingTable, backends: Arc<ToolBackendRegistry>) -> Result<Self> {
        let mut keywords = Vec::with_capacity(table.tools.len());
        for spec in table.tools.list() {
            let mut compiled = Vec::new();
            for keyword in &spec.keywords {
                let lowered = keyword.trim().to_lowercase();
                if lowered.is_empty() {
                    continue;
                }
                let pattern = format!(r"(?-u:\b){}(?-u:\b)", regex::escape(&lowered));
                let whole_word = Regex::new(&pattern).with_context(|| {
                    format!("invalid keyword '{keyword}' for tool '{}'", spec.name)
                })?;
                compiled.push(CompiledKeyword {
                    keyword: lowered,
                    whole_word,
                });
            }
            keywords.push((spec.name.clone(), compiled));
        }
        Ok(Self {
            tools: table.tools.clone(),
            scoring: table.scoring.clone(),
            keywords,
            backends,
        })
    }

    /// Scores every tool in declaration order.
    pub fn score(&self, prompt: &str) -> Vec<ToolScore> {
        let lowered = prompt.to_lowercase();
        self.keywords
            .iter()
            .map(|(tool, keywords)| {
                let mut weight = 0;
                let mut matched = Vec::new();
                for entry in keywords {
                    if !lowered.contains(entry.keyword.as_str()) {
                        continue;
                    }
                    weight += if entry.whole_word.is_match(&lowered) {
                        self.scoring.exact_match_weight
                    } else {
                        self.scoring.partial_match_weight
                    };
                    matched.push(entry.keyword.clone());
                }
                ToolScore {
                    tool: tool.clone(),
                    weight,
                    matched,
                }
            })
            .collect()
    }

    pub fn classify(&self, prompt: &str) -> ClassificationResult {
        let scores = self.score(prompt);
        // Strict comparison keeps the first-declared tool on ties.
        let mut best: Option<&ToolScore> = None;
        for score in &scores {
            if best.map_or(true, |current| score.weight > current.weight) {
                best = Some(score);
            }
        }

        let Some(best) = best else {
            return self.fallback();
        };
        let confidence = self.confidence_for(prompt, best.weight);
        if confidence < self.scoring.min_confidence {
            return self.fallback();
        }
        let Some(spec) = self.tools.get(&best.tool) else {
            return self.fallback();
        };

        ClassificationResult {
            tool: spec.name.clone(),
            confidence,
            reasoning: format!(
                "Selected {} based on detected keywords: {}. Confidence score: {} matches found.",
                spec.display_name,
                best.matched.join(", "),
                best.weight
            ),
            parameters: self.parameters_for(spec, prompt),
        }
    }

    /// Forces `tool` without scoring, for single-purpose harnesses.
    pub fn classify_as(&self, prompt: &str, tool: &str) -> Result<ClassificationResult> {
        let spec = self.tools.get(tool).with_context(|| {
            format!(
                "unknown tool '{tool}' (available: [{}])",
                self.tools.names().join(", ")
            )
        })?;
        Ok(ClassificationResult {
            tool: spec.name.clone(),
            confidence: 1.0,
            reasoning: format!("Requested {} directly.", spec.display_name),
            parameters: self.parameters_for(spec, prompt),
        })
    }

    fn confidence_for(&self, prompt: &str, weight: u32) -> f64 {
        let scoring = &self.scoring;
        let mut confidence = (f64::from(weight) * scoring.confidence_per_point).min(1.0);
        if prompt.chars().count() > scoring.clarity_min_chars
            && weight >= scoring.clarity_min_weight
        {
            confidence = (confidence + scoring.clarity_bonus).min(1.0);
        }
        confidence
    }

    fn parameters_for(&self, spec: &ToolSpec, prompt: &str) -> Map<String, serde_json::Value> {
        self.backends
            .resolve(&spec.name)
            .synthesize_parameters(spec, prompt)
    }

    fn fallback(&self) -> ClassificationResult {
        let fallback = &self.scoring.fallback;
        ClassificationResult {
            tool: fallback.tool.clone(),
            confidence: fallback.confidence,
            reasoning: fallback.reasoning.clone(),
            parameters: fallback.parameters.clone(),
        }
    }
}
