use anyhow::{bail, Result};
use toolrouter_contracts::results::ToolResult;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum RouterState {
    #[default]
    Idle,
    Refining,
    Classifying,
    Executing {
        tool: String,
    },
    Finalizing,
    Done(ToolResult),
    Failed(ToolResult),
}

#[derive(Debug, Clone, PartialEq)]
pub enum StageEvent {
    Started,
    Refined,
    Classified { tool: String },
    Executed,
    Finished(ToolResult),
    Failed(ToolResult),
    Reset,
}

impl RouterState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Refining => "refining",
            Self::Classifying => "classifying",
            Self::Executing { .. } => "executing",
            Self::Finalizing => "finalizing",
            Self::Done(_) => "done",
            Self::Failed(_) => "failed",
        }
    }

    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            Self::Refining | Self::Classifying | Self::Executing { .. } | Self::Finalizing
        )
    }

    /// Result of the last finished request, if the router is not busy.
    pub fn result(&self) -> Option<&ToolResult> {
        match self {
            Self::Done(result) | Self::Failed(result) => Some(result),
            _ => None,
        }
    }

    /// Progress text shown while a stage runs.
    pub fn status_message(&self) -> Option<String> {
        match self {
            Self::Refining => Some("Analyzing and refining your request...".to_string()),
            Self::Classifying => Some("Determining the best tool for your request...".to_string()),
            Self::Executing { tool } => Some(format!("Generating content with {tool}...")),
            Self::Finalizing => Some("Finalizing your result...".to_string()),
            _ => None,
        }
    }

    pub fn apply(self, event: StageEvent) -> Result<Self> {
        let next = match (self, event) {
            (_, StageEvent::Reset) => Self::Idle,
            (_, StageEvent::Started) => Self::Refining,
            (Self::Refining, StageEvent::Refined) => Self::Classifying,
            (Self::Classifying, StageEvent::Classified { tool }) => Self::Executing { tool },
            (Self::Executing { .. }, StageEvent::Executed) => Self::Finalizing,
            (Self::Finalizing, StageEvent::Finished(result)) => Self::Done(result),
            (state, StageEvent::Failed(result)) if state.is_busy() => Self::Failed(result),
            (state, event) => bail!(
                "invalid router transition from {} on {}",
                state.name(),
                event_name(&event)
            ),
        };
        Ok(next)
    }
}

fn event_name(event: &StageEvent) -> &'static str {
    match event {
        StageEvent::Started => "started",
        StageEvent::Refined => "refined",
        StageEvent::Classified { .. } => "classified",
        StageEvent::Executed => "executed",
        StageEvent::Finished(_) => "finished",
        StageEvent::Failed(_) => "failed",
        StageEvent::Reset => "reset",
    }
}

#[cfg(test)]
mod tests {
    use toolrouter_contracts::results::ToolResult;

    use super::{RouterState, StageEvent};

    #[test]
    fn happy_path_walks_every_stage() -> anyhow::Result<()> {
        let result = ToolResult::failure("x");
        let state = RouterState::Idle.apply(StageEvent::Started)?;
        assert_eq!(state, RouterState::Refining);
        let state = state.apply(StageEvent::Refined)?;
        assert_eq!(state, RouterState::Classifying);
        let state = state.apply(StageEvent::Classified {
            tool: "canva".to_string(),
        })?;
        assert_eq!(
            state.status_message().as_deref(),
            Some("Generating content with canva...")
        );
        let state = state.apply(StageEvent::Executed)?;
        assert_eq!(
            state.status_message().as_deref(),
            Some("Finalizing your result...")
        );
        assert!(state.is_busy());
        let state = state.apply(StageEvent::Finished(result.clone()))?;
        assert_eq!(state.result(), Some(&result));
        assert!(state.status_message().is_none());
        Ok(())
    }

    #[test]
    fn started_supersedes_any_state() -> anyhow::Result<()> {
        let executing = RouterState::Executing {
            tool: "canva".to_string(),
        };
        assert_eq!(executing.apply(StageEvent::Started)?, RouterState::Refining);
        let done = RouterState::Done(ToolResult::failure("x"));
        assert_eq!(done.apply(StageEvent::Started)?, RouterState::Refining);
        Ok(())
    }

    #[test]
    fn failure_only_applies_while_busy() -> anyhow::Result<()> {
        let failed = RouterState::Classifying.apply(StageEvent::Failed(ToolResult::failure("x")))?;
        assert_eq!(failed.name(), "failed");

        let err = RouterState::Idle
            .apply(StageEvent::Failed(ToolResult::failure("x")))
            .expect_err("idle cannot fail");
        assert!(err.to_string().contains("from idle on failed"));
        Ok(())
    }

    #[test]
    fn out_of_order_events_are_rejected() -> anyhow::Result<()> {
        assert!(RouterState::Idle.apply(StageEvent::Refined).is_err());
        assert!(RouterState::Refining.apply(StageEvent::Executed).is_err());
        assert!(RouterState::Executing {
            tool: "canva".to_string()
        }
        .apply(StageEvent::Finished(ToolResult::failure("x")))
        .is_err());
        assert_eq!(
            RouterState::Finalizing
                .apply(StageEvent::Failed(ToolResult::failure("x")))?
                .name(),
            "failed"
        );
        Ok(())
    }

    #[test]
    fn reset_always_returns_to_idle() -> anyhow::Result<()> {
        assert_eq!(
            RouterState::Refining.apply(StageEvent::Reset)?,
            RouterState::Idle
        );
        assert_eq!(
            RouterState::Failed(ToolResult::failure("x")).apply(StageEvent::Reset)?,
            RouterState::Idle
        );
        Ok(())
    }

    #[test]
    fn status_messages_per_stage() {
        assert_eq!(
            RouterState::Refining.status_message().as_deref(),
            Some("Analyzing and refining your request...")
        );
        assert_eq!(
            RouterState::Classifying.status_message().as_deref(),
            Some("Determining the best tool for your request...")
        );
        assert!(RouterState::Idle.status_message().is_none());
    }
}
