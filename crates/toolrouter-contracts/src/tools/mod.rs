mod registry;
mod routing;

pub use registry::{ParameterRule, ToolSpec, ToolTable, ValueRule};
pub use routing::{
    merge_routing_rows, Enrichment, FallbackRule, RefinerCategory, RefinerRules, RoutingTable,
    ScoringRules,
};

pub const TOOL_CANVA: &str = "canva";
pub const TOOL_OPENAI_IMAGE: &str = "openai-image";
pub const TOOL_VEO3_VIDEO: &str = "veo3-video";
pub const TOOL_OPENAI_TEXT: &str = "openai-text";

/// Sentinel tool id used only by the router's failure path.
pub const ERROR_TOOL: &str = "error";
