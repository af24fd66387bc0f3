pub mod backends;
pub mod classifier;
pub mod config;
pub mod executor;
pub mod refiner;
pub mod state;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use anyhow::Result;
use serde_json::{json, Map, Value};
use toolrouter_contracts::events::EventWriter;
use toolrouter_contracts::results::{ClassificationResult, ToolResult};
use toolrouter_contracts::tools::RoutingTable;
use uuid::Uuid;

pub use backends::{
    default_backend_registry, SynthesizedOutput, ToolBackend, ToolBackendRegistry, ToolInvocation,
};
pub use classifier::{Classifier, ToolScore};
pub use config::{IdStrategy, RouterConfig};
pub use executor::{AssetIds, MockExecutor};
pub use refiner::{Refinement, Refiner};
pub use state::{RouterState, StageEvent};

const ERROR_CHAIN_MAX_CHARS: usize = 600;

/// What happened to one submitted request.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Blank input; no stage ran.
    Rejected,
    Completed(ToolResult),
    /// A stage failed and the error result was produced instead.
    Failed(ToolResult),
    /// A newer request or a reset arrived while this one ran. The router
    /// state was left untouched.
    Superseded {
        seq: u64,
        latest: u64,
        result: ToolResult,
    },
}

/// Refinement and classification of a prompt without executing anything.
#[derive(Debug, Clone, PartialEq)]
pub struct Explanation {
    pub refinement: Refinement,
    pub scores: Vec<ToolScore>,
    pub classification: ClassificationResult,
}

#[derive(Debug, Default)]
struct RouterSlot {
    state: RouterState,
    latest_seq: u64,
}

/// Runs refine, classify and execute for each request and tracks the
/// newest request's progress.
///
/// Every accepted request takes a sequence number. Only the request holding
/// the latest number may move the state machine; older ones still finish
/// but come back as [`SubmitOutcome::Superseded`].
pub struct ToolRouter {
    refiner: Refiner,
    classifier: Classifier,
    executor: MockExecutor,
    table: RoutingTable,
    refine_delay: Duration,
    classify_delay: Duration,
    events: EventWriter,
    slot: Mutex<RouterSlot>,
}

impl ToolRouter {
    /// Router over the configured routing table and the built-in backends.
    pub fn new(config: &RouterConfig, events: EventWriter) -> Result<Self> {
        let table = config.load_routing_table()?;
        Self::with_parts(config, table, default_backend_registry(), events)
    }

    pub fn with_parts(
        config: &RouterConfig,
        table: RoutingTable,
        backends: ToolBackendRegistry,
        events: EventWriter,
    ) -> Result<Self> {
        let backends = Arc::new(backends);
        let refiner = Refiner::new(table.refiner.clone())?;
        let classifier = Classifier::new(&table, Arc::clone(&backends))?;
        let executor = MockExecutor::new(
            backends,
            table.clone(),
            config.execute_delay,
            config.id_strategy,
        );

        events.emit(
            "session_started",
            map_object(json!({
                "tools": table.tools.names(),
                "refine_delay_ms": duration_millis(config.refine_delay),
                "classify_delay_ms": duration_millis(config.classify_delay),
                "execute_delay_ms": duration_millis(config.execute_delay),
            })),
        )?;

        Ok(Self {
            refiner,
            classifier,
            executor,
            table,
            refine_delay: config.refine_delay,
            classify_delay: config.classify_delay,
            events,
            slot: Mutex::new(RouterSlot::default()),
        })
    }

    pub fn routing_table(&self) -> &RoutingTable {
        &self.table
    }

    pub fn state(&self) -> RouterState {
        self.slot().state.clone()
    }

    pub fn status_message(&self) -> Option<String> {
        self.slot().state.status_message()
    }

    /// Routes `input` through every stage, blocking on the simulated delays.
    pub fn submit(&self, input: &str) -> SubmitOutcome {
        self.submit_inner(input, None)
    }

    /// Refines `input` and runs `tool` directly, skipping classification.
    pub fn submit_direct(&self, input: &str, tool: &str) -> SubmitOutcome {
        self.submit_inner(input, Some(tool))
    }

    pub fn refine(&self, input: &str) -> Refinement {
        self.refiner.refine_detailed(input)
    }

    pub fn explain(&self, input: &str) -> Explanation {
        let refinement = self.refiner.refine_detailed(input);
        let scores = self.classifier.score(&refinement.refined);
        let classification = self.classifier.classify(&refinement.refined);
        Explanation {
            refinement,
            scores,
            classification,
        }
    }

    /// Returns to idle and makes every in-flight request stale.
    pub fn reset(&self) {
        let latest_seq = {
            let mut slot = self.slot();
            slot.latest_seq += 1;
            slot.state = RouterState::Idle;
            slot.latest_seq
        };
        let _ = self.events.emit(
            "session_reset",
            map_object(json!({ "latest_seq": latest_seq })),
        );
    }

    fn submit_inner(&self, input: &str, tool: Option<&str>) -> SubmitOutcome {
        if input.trim().is_empty() {
            let _ = self
                .events
                .emit("request_rejected", map_object(json!({ "input": input })));
            return SubmitOutcome::Rejected;
        }

        let seq = {
            let mut slot = self.slot();
            slot.latest_seq += 1;
            let current = std::mem::take(&mut slot.state);
            slot.state = current
                .apply(StageEvent::Started)
                .unwrap_or(RouterState::Refining);
            slot.latest_seq
        };
        let _ = self.events.emit(
            "request_started",
            map_object(json!({
                "seq": seq,
                "input": input,
                "tool": tool,
            })),
        );

        let outcome = self.run_stages(seq, input, tool);
        let (result, event) = match outcome {
            Ok(result) => (result.clone(), StageEvent::Finished(result)),
            Err(err) => {
                let _ = self.events.emit(
                    "request_failed",
                    map_object(json!({
                        "seq": seq,
                        "input": input,
                        "error": error_chain_text(&err, ERROR_CHAIN_MAX_CHARS),
                    })),
                );
                let result = ToolResult::failure(input);
                (result.clone(), StageEvent::Failed(result))
            }
        };

        let failed = matches!(event, StageEvent::Failed(_));
        let mut slot = self.slot();
        if slot.latest_seq != seq {
            let latest = slot.latest_seq;
            drop(slot);
            let _ = self.events.emit(
                "request_superseded",
                map_object(json!({
                    "seq": seq,
                    "latest_seq": latest,
                    "selected_tool": result.selected_tool,
                })),
            );
            return SubmitOutcome::Superseded {
                seq,
                latest,
                result,
            };
        }
        if let Ok(next) = slot.state.clone().apply(event) {
            slot.state = next;
        }
        drop(slot);

        if failed {
            SubmitOutcome::Failed(result)
        } else {
            SubmitOutcome::Completed(result)
        }
    }

    fn run_stages(&self, seq: u64, input: &str, tool: Option<&str>) -> Result<ToolResult> {
        pause(self.refine_delay);
        let refinement = self.refiner.refine_detailed(input);
        let _ = self.events.emit(
            "prompt_refined",
            map_object(json!({
                "seq": seq,
                "refined_prompt": refinement.refined,
                "category": refinement.category,
            })),
        );
        self.advance(seq, StageEvent::Refined)?;

        let classification = match tool {
            Some(tool) => self.classifier.classify_as(&refinement.refined, tool)?,
            None => {
                pause(self.classify_delay);
                self.classifier.classify(&refinement.refined)
            }
        };
        let _ = self.events.emit(
            "tool_classified",
            map_object(json!({
                "seq": seq,
                "tool": classification.tool,
                "confidence": classification.confidence,
                "reasoning": classification.reasoning,
                "parameters": Value::Object(classification.parameters.clone()),
            })),
        );
        self.advance(
            seq,
            StageEvent::Classified {
                tool: classification.tool.clone(),
            },
        )?;

        let mut result = self
            .executor
            .execute(&classification, &refinement.refined)?;
        result.original_input = input.to_string();
        self.advance(seq, StageEvent::Executed)?;
        let metadata = result.metadata.clone().unwrap_or_default();
        let _ = self.events.emit(
            "tool_executed",
            map_object(json!({
                "seq": seq,
                "tool": result.selected_tool,
                "processing_time_ms": metadata.processing_time,
                "tool_version": metadata.tool_version,
            })),
        );
        Ok(result)
    }

    /// Moves the state machine for `seq`. Stale requests leave it alone.
    fn advance(&self, seq: u64, event: StageEvent) -> Result<()> {
        let mut slot = self.slot();
        if slot.latest_seq != seq {
            return Ok(());
        }
        slot.state = slot.state.clone().apply(event)?;
        Ok(())
    }

    fn slot(&self) -> MutexGuard<'_, RouterSlot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub fn new_session_id() -> String {
    format!("session-{}", Uuid::new_v4().simple())
}

fn pause(delay: Duration) {
    if !delay.is_zero() {
        thread::sleep(delay);
    }
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn map_object(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

fn error_chain_text(err: &anyhow::Error, max_chars: usize) -> String {
    let mut parts: Vec<String> = Vec::new();
    for cause in err.chain() {
        let text = cause.to_string();
        let trimmed = text.trim();
        if trimmed.is_empty() || parts.last().is_some_and(|last| last == trimmed) {
            continue;
        }
        parts.push(trimmed.to_string());
    }
    let joined = if parts.is_empty() {
        err.to_string()
    } else {
        parts.join(" | caused by: ")
    };
    truncate_text(&joined, max_chars)
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}
