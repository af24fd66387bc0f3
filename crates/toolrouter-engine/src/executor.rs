use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde_json::Value;
use sha2::{Digest, Sha256};
use toolrouter_contracts::results::{ClassificationResult, ToolMetadata, ToolResult};
use toolrouter_contracts::tools::RoutingTable;
use uuid::Uuid;

use crate::backends::{ToolBackendRegistry, ToolInvocation};
use crate::config::IdStrategy;

const ASSET_ID_LEN: usize = 9;

/// Produces short alphanumeric ids for fabricated assets.
#[derive(Debug)]
pub struct AssetIds {
    strategy: IdStrategy,
    counter: AtomicU64,
}

impl AssetIds {
    pub fn new(strategy: IdStrategy) -> Self {
        Self {
            strategy,
            counter: AtomicU64::new(0),
        }
    }

    pub fn next(&self, prompt: &str) -> String {
        match self.strategy {
            IdStrategy::Random => {
                let simple = Uuid::new_v4().simple().to_string();
                simple[..ASSET_ID_LEN].to_string()
            }
            IdStrategy::Deterministic => {
                let count = self.counter.fetch_add(1, Ordering::Relaxed);
                short_id(&format!("{prompt}\n{count}"))
            }
        }
    }
}

fn short_id(seed: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(seed.as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..ASSET_ID_LEN].to_string()
}

/// Fabricates tool responses after a simulated latency.
pub struct MockExecutor {
    backends: Arc<ToolBackendRegistry>,
    table: RoutingTable,
    delay: Duration,
    ids: AssetIds,
}

impl MockExecutor {
    pub fn new(
        backends: Arc<ToolBackendRegistry>,
        table: RoutingTable,
        delay: Duration,
        id_strategy: IdStrategy,
    ) -> Self {
        Self {
            backends,
            table,
            delay,
            ids: AssetIds::new(id_strategy),
        }
    }

    /// `original_input` is set to `prompt`; the router replaces it with the
    /// caller's input.
    pub fn execute(
        &self,
        classification: &ClassificationResult,
        prompt: &str,
    ) -> Result<ToolResult> {
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        // Only synthesis is timed; the simulated latency is not.
        let started = Instant::now();

        let backend = self.backends.resolve(&classification.tool);
        let asset_id = self.ids.next(prompt);
        let output = backend
            .synthesize_output(&ToolInvocation {
                prompt,
                parameters: &classification.parameters,
                asset_id: &asset_id,
            })
            .with_context(|| format!("backend '{}' failed", backend.name()))?;
        let tool_output = serde_json::to_string(&Value::Object(output.payload))
            .context("failed serializing tool output")?;

        let tool_version = self
            .table
            .tools
            .get(&classification.tool)
            .map(|spec| spec.version_label.clone())
            .unwrap_or_else(|| self.table.generic_version_label.clone());

        Ok(ToolResult {
            original_input: prompt.to_string(),
            refined_prompt: prompt.to_string(),
            selected_tool: classification.tool.clone(),
            tool_output,
            final_message: output.final_message,
            confidence: classification.confidence,
            metadata: Some(ToolMetadata {
                processing_time: Some(elapsed_millis(started)),
                tool_version: Some(tool_version),
                additional_info: Some(classification.reasoning.clone()),
            }),
        })
    }
}

fn elapsed_millis(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
