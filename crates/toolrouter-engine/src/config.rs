use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use toolrouter_contracts::tools::RoutingTable;

pub const DEFAULT_REFINE_DELAY_MS: u64 = 1000;
pub const DEFAULT_CLASSIFY_DELAY_MS: u64 = 800;
pub const DEFAULT_EXECUTE_DELAY_MS: u64 = 2000;

pub const ENV_REFINE_DELAY_MS: &str = "TOOLROUTER_REFINE_DELAY_MS";
pub const ENV_CLASSIFY_DELAY_MS: &str = "TOOLROUTER_CLASSIFY_DELAY_MS";
pub const ENV_EXECUTE_DELAY_MS: &str = "TOOLROUTER_EXECUTE_DELAY_MS";
pub const ENV_ID_STRATEGY: &str = "TOOLROUTER_ID_STRATEGY";
pub const ENV_ROUTING_TABLE: &str = "TOOLROUTER_ROUTING_TABLE";

/// How mock asset ids are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdStrategy {
    #[default]
    Random,
    /// Hash of prompt and call counter, reproducible across runs.
    Deterministic,
}

impl IdStrategy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "random" => Some(Self::Random),
            "deterministic" | "stable" => Some(Self::Deterministic),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouterConfig {
    pub refine_delay: Duration,
    pub classify_delay: Duration,
    pub execute_delay: Duration,
    pub id_strategy: IdStrategy,
    pub routing_table_path: Option<PathBuf>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            refine_delay: Duration::from_millis(DEFAULT_REFINE_DELAY_MS),
            classify_delay: Duration::from_millis(DEFAULT_CLASSIFY_DELAY_MS),
            execute_delay: Duration::from_millis(DEFAULT_EXECUTE_DELAY_MS),
            id_strategy: IdStrategy::default(),
            routing_table_path: None,
        }
    }
}

impl RouterConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(non_empty_env)
    }

    /// Build a config from an arbitrary key lookup. Unparseable values keep
    /// their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let delay = |key: &str, default_ms: u64| {
            let millis = lookup(key)
                .and_then(|value| value.trim().parse::<u64>().ok())
                .unwrap_or(default_ms);
            Duration::from_millis(millis)
        };
        Self {
            refine_delay: delay(ENV_REFINE_DELAY_MS, DEFAULT_REFINE_DELAY_MS),
            classify_delay: delay(ENV_CLASSIFY_DELAY_MS, DEFAULT_CLASSIFY_DELAY_MS),
            execute_delay: delay(ENV_EXECUTE_DELAY_MS, DEFAULT_EXECUTE_DELAY_MS),
            id_strategy: lookup(ENV_ID_STRATEGY)
                .and_then(|value| IdStrategy::parse(&value))
                .unwrap_or_default(),
            routing_table_path: lookup(ENV_ROUTING_TABLE).map(PathBuf::from),
        }
    }

    pub fn without_delays(mut self) -> Self {
        self.refine_delay = Duration::ZERO;
        self.classify_delay = Duration::ZERO;
        self.execute_delay = Duration::ZERO;
        self
    }

    /// Explicit override path, else `$HOME/.toolrouter/routing_overrides.json`.
    pub fn resolved_routing_table_path(&self) -> Option<PathBuf> {
        self.routing_table_path
            .clone()
            .or_else(default_routing_override_path)
    }

    pub fn load_routing_table(&self) -> Result<RoutingTable> {
        RoutingTable::load(self.resolved_routing_table_path().as_deref())
    }
}

fn default_routing_override_path() -> Option<PathBuf> {
    env::var_os("HOME")
        .map(PathBuf::from)
        .map(|home| home.join(".toolrouter").join("routing_overrides.json"))
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
