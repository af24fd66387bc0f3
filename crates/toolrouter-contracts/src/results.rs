use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::tools::ERROR_TOOL;

pub const ERROR_TOOL_OUTPUT: &str =
    "An error occurred while processing your request. Please try again.";
pub const ERROR_FINAL_MESSAGE: &str =
    "Something went wrong. Please check your input and try again.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub tool: String,
    pub confidence: f64,
    pub reasoning: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolMetadata {
    /// Elapsed wall-clock milliseconds spent in the executor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_time: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_info: Option<String>,
}

/// Outcome of one routed request. `tool_output` holds serialized JSON whose
/// shape depends on `selected_tool`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    pub original_input: String,
    pub refined_prompt: String,
    pub selected_tool: String,
    pub tool_output: String,
    pub final_message: String,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ToolMetadata>,
}

impl ToolResult {
    pub fn failure(input: &str) -> Self {
        Self {
            original_input: input.to_string(),
            refined_prompt: input.to_string(),
            selected_tool: ERROR_TOOL.to_string(),
            tool_output: ERROR_TOOL_OUTPUT.to_string(),
            final_message: ERROR_FINAL_MESSAGE.to_string(),
            confidence: 0.0,
            metadata: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.selected_tool == ERROR_TOOL
    }

    /// Parsed `tool_output`, or `{"raw_output": ...}` when it is not JSON.
    pub fn output_json(&self) -> Value {
        serde_json::from_str(&self.tool_output).unwrap_or_else(|_| {
            let mut raw = Map::new();
            raw.insert(
                "raw_output".to_string(),
                Value::String(self.tool_output.clone()),
            );
            Value::Object(raw)
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::{ToolMetadata, ToolResult, ERROR_FINAL_MESSAGE};

    #[test]
    fn tool_result_serializes_with_camel_case_fields() -> anyhow::Result<()> {
        let result = ToolResult {
            original_input: "make a logo".to_string(),
            refined_prompt: "Create a logo".to_string(),
            selected_tool: "canva".to_string(),
            tool_output: json!({"design_id": "canva_design_abc"}).to_string(),
            final_message: "done".to_string(),
            confidence: 0.6,
            metadata: Some(ToolMetadata {
                processing_time: Some(12),
                tool_version: Some("Canva API v2.1".to_string()),
                additional_info: None,
            }),
        };
        let value = serde_json::to_value(&result)?;
        assert_eq!(value["originalInput"], json!("make a logo"));
        assert_eq!(value["refinedPrompt"], json!("Create a logo"));
        assert_eq!(value["selectedTool"], json!("canva"));
        assert_eq!(value["finalMessage"], json!("done"));
        assert_eq!(value["metadata"]["processingTime"], json!(12));
        assert_eq!(value["metadata"]["toolVersion"], json!("Canva API v2.1"));
        assert!(value["metadata"].get("additionalInfo").is_none());

        let parsed: ToolResult = serde_json::from_value(value)?;
        assert_eq!(parsed, result);
        Ok(())
    }

    #[test]
    fn failure_result_uses_error_sentinel() {
        let result = ToolResult::failure("draw me a cat");
        assert!(result.is_error());
        assert_eq!(result.selected_tool, "error");
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.original_input, "draw me a cat");
        assert_eq!(result.refined_prompt, "draw me a cat");
        assert_eq!(result.final_message, ERROR_FINAL_MESSAGE);
        assert!(result.metadata.is_none());
    }

    #[test]
    fn output_json_wraps_non_json_output() {
        let result = ToolResult::failure("x");
        let parsed = result.output_json();
        assert_eq!(
            parsed["raw_output"],
            Value::String(result.tool_output.clone())
        );
    }
}
