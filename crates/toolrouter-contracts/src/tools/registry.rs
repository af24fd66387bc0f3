use anyhow::{bail, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueRule {
    #[serde(default)]
    pub any: Vec<String>,
    pub value: Value,
}

impl ValueRule {
    pub fn matches(&self, haystack: &str) -> bool {
        self.any
            .iter()
            .any(|needle| !needle.is_empty() && haystack.contains(needle.as_str()))
    }
}

/// One synthesized parameter: the first matching `when` rule wins, otherwise
/// `default` is used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterRule {
    pub name: String,
    #[serde(default)]
    pub when: Vec<ValueRule>,
    pub default: Value,
}

impl ParameterRule {
    pub fn resolve(&self, haystack: &str) -> Value {
        self.when
            .iter()
            .find(|rule| rule.matches(haystack))
            .map(|rule| rule.value.clone())
            .unwrap_or_else(|| self.default.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    pub version_label: String,
    pub keywords: Vec<String>,
    #[serde(default)]
    pub parameters: Vec<ParameterRule>,
}

impl ToolSpec {
    pub fn resolve_parameters(&self, prompt: &str) -> Map<String, Value> {
        let lowered = prompt.to_lowercase();
        let mut params = Map::new();
        for rule in &self.parameters {
            params.insert(rule.name.clone(), rule.resolve(&lowered));
        }
        params
    }
}

/// Tools in declaration order. Order matters: it breaks scoring ties.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolTable {
    tools: IndexMap<String, ToolSpec>,
}

impl ToolTable {
    pub fn new(tools: Vec<ToolSpec>) -> Result<Self> {
        let mut map = IndexMap::new();
        for tool in tools {
            let name = tool.name.trim().to_string();
            if name.is_empty() {
                bail!("routing table contains a tool with an empty name");
            }
            if map.contains_key(&name) {
                bail!("duplicate tool '{name}' in routing table");
            }
            map.insert(name, tool);
        }
        Ok(Self { tools: map })
    }

    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn list(&self) -> impl Iterator<Item = &ToolSpec> {
        self.tools.values()
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ParameterRule, ToolSpec, ToolTable, ValueRule};

    fn tool(name: &str, keywords: &[&str]) -> ToolSpec {
        ToolSpec {
            name: name.to_string(),
            display_name: name.to_uppercase(),
            description: String::new(),
            version_label: "v1".to_string(),
            keywords: keywords.iter().map(|item| (*item).to_string()).collect(),
            parameters: Vec::new(),
        }
    }

    #[test]
    fn tool_table_keeps_declaration_order() -> anyhow::Result<()> {
        let table = ToolTable::new(vec![tool("z", &[]), tool("a", &[]), tool("m", &[])])?;
        assert_eq!(table.names(), vec!["z", "a", "m"]);
        assert_eq!(table.len(), 3);
        assert!(table.contains("a"));
        assert!(table.get("missing").is_none());
        Ok(())
    }

    #[test]
    fn tool_table_rejects_duplicates() {
        let err = ToolTable::new(vec![tool("canva", &[]), tool("canva", &[])])
            .err()
            .map(|err| err.to_string())
            .unwrap_or_default();
        assert_eq!(err, "duplicate tool 'canva' in routing table");
    }

    #[test]
    fn first_matching_rule_wins_over_later_rules() {
        let rule = ParameterRule {
            name: "duration".to_string(),
            when: vec![
                ValueRule {
                    any: vec!["short".to_string(), "clip".to_string()],
                    value: json!("15s"),
                },
                ValueRule {
                    any: vec!["long".to_string()],
                    value: json!("60s"),
                },
            ],
            default: json!("30s"),
        };
        assert_eq!(rule.resolve("a long clip"), json!("15s"));
        assert_eq!(rule.resolve("a long film"), json!("60s"));
        assert_eq!(rule.resolve("a film"), json!("30s"));
    }

    #[test]
    fn resolve_parameters_lowercases_prompt() {
        let mut spec = tool("canva", &["logo"]);
        spec.parameters = vec![ParameterRule {
            name: "template_category".to_string(),
            when: vec![ValueRule {
                any: vec!["logo".to_string()],
                value: json!("logo"),
            }],
            default: json!("general"),
        }];
        let params = spec.resolve_parameters("Create a LOGO");
        assert_eq!(params["template_category"], json!("logo"));
    }
}
