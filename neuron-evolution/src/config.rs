//! Flat key-value configuration surface for the whole agent system.
//!
//! No settings-file format is assumed — [`NeuronConfig::from_flat`] parses
//! the dotted-key surface a caller already has (environment variables, a
//! config file they parsed themselves, command-line flags) into typed
//! fields. Everything has a default, matching [`neuron_op_react::ReactConfig`]'s
//! convention of a `Default` impl a caller can selectively override.

use std::collections::HashMap;

use thiserror::Error;

/// Errors parsing the flat configuration surface.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A recognized key's value didn't parse as the expected type.
    #[error("invalid value for '{key}': {value}")]
    InvalidValue {
        /// The dotted key.
        key: String,
        /// The value that failed to parse.
        value: String,
    },
}

/// Typed view over the flat `react.*` / `compaction.*` / `bge.*` /
/// `reranker.*` / `self.evolution.*` / `vector.*` / `concurrency.*` /
/// `doomloop.*` configuration surface.
#[derive(Debug, Clone, PartialEq)]
pub struct NeuronConfig {
    /// `react.max.steps` — cap on C7 ReAct iterations.
    pub react_max_steps: u32,
    /// `react.enable.streaming` — stream tokens to the turn sink.
    pub react_enable_streaming: bool,
    /// `compaction.max.tokens` — C6 high-water mark for context rewrite.
    pub compaction_max_tokens: usize,
    /// `compaction.threshold` — C6 trigger threshold (fraction of max, 0..1).
    pub compaction_threshold: f64,
    /// `bge.endpoint` — embedding service base URL.
    pub bge_endpoint: Option<String>,
    /// `reranker.enabled`.
    pub reranker_enabled: bool,
    /// `reranker.base.url`.
    pub reranker_base_url: Option<String>,
    /// `reranker.threshold` — minimum relevance score to keep a result.
    pub reranker_threshold: f64,
    /// `reranker.retry` — max retry attempts.
    pub reranker_retry: u32,
    /// `self.evolution.enabled` — activate C10.
    pub self_evolution_enabled: bool,
    /// `self.evolution.questions.per.iteration`.
    pub self_evolution_questions_per_iteration: u32,
    /// `self.evolution.max.exploration.steps`.
    pub self_evolution_max_exploration_steps: u32,
    /// `self.evolution.interval.ms` — sleep between iterations.
    pub self_evolution_interval_ms: u64,
    /// `vector.db.l1.cache.size` — L1 LRU capacity.
    pub vector_db_l1_cache_size: usize,
    /// `concurrency.bge` — embedding call semaphore size.
    pub concurrency_bge: usize,
    /// `concurrency.llm` — LLM call semaphore size.
    pub concurrency_llm: usize,
    /// `concurrency.rerank` — rerank call semaphore size.
    pub concurrency_rerank: usize,
    /// `concurrency.analysis` — analysis-scheduler semaphore size.
    pub concurrency_analysis: usize,
    /// `doomloop.baseMs` — [`neuron_guard::GuardConfig::base_ms`].
    pub doomloop_base_ms: u64,
    /// `doomloop.capMs` — [`neuron_guard::GuardConfig::cap_ms`].
    pub doomloop_cap_ms: u64,
    /// `doomloop.dailyQuota` — daily question/exploration quota.
    pub doomloop_daily_quota: u32,
}

impl Default for NeuronConfig {
    fn default() -> Self {
        Self {
            react_max_steps: 25,
            react_enable_streaming: false,
            compaction_max_tokens: 100_000,
            compaction_threshold: 0.8,
            bge_endpoint: None,
            reranker_enabled: false,
            reranker_base_url: None,
            reranker_threshold: 0.0,
            reranker_retry: 2,
            self_evolution_enabled: false,
            self_evolution_questions_per_iteration: 3,
            self_evolution_max_exploration_steps: 10,
            self_evolution_interval_ms: 60_000,
            vector_db_l1_cache_size: 1_000,
            concurrency_bge: 4,
            concurrency_llm: 2,
            concurrency_rerank: 2,
            concurrency_analysis: 2,
            doomloop_base_ms: 1_000,
            doomloop_cap_ms: 10 * 60 * 1000,
            doomloop_daily_quota: 50,
        }
    }
}

macro_rules! parse_into {
    ($map:expr, $key:expr, $field:expr, $parser:expr) => {
        if let Some(raw) = $map.get($key) {
            $field = $parser(raw.as_str()).ok_or_else(|| ConfigError::InvalidValue {
                key: $key.to_string(),
                value: raw.clone(),
            })?;
        }
    };
}

fn parse_bool(s: &str) -> Option<bool> {
    s.parse().ok()
}
fn parse_u32(s: &str) -> Option<u32> {
    s.parse().ok()
}
fn parse_u64(s: &str) -> Option<u64> {
    s.parse().ok()
}
fn parse_usize(s: &str) -> Option<usize> {
    s.parse().ok()
}
fn parse_f64(s: &str) -> Option<f64> {
    s.parse().ok()
}

impl NeuronConfig {
    /// Parse the dotted-key flat surface described in the external
    /// interfaces section into a typed config, starting from
    /// [`NeuronConfig::default`] and overriding only the keys present in
    /// `map`. Unrecognized keys are ignored (forward-compatible with a
    /// caller passing a superset of keys this crate doesn't yet know
    /// about).
    pub fn from_flat(map: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        parse_into!(map, "react.max.steps", config.react_max_steps, parse_u32);
        parse_into!(
            map,
            "react.enable.streaming",
            config.react_enable_streaming,
            parse_bool
        );
        parse_into!(
            map,
            "compaction.max.tokens",
            config.compaction_max_tokens,
            parse_usize
        );
        parse_into!(
            map,
            "compaction.threshold",
            config.compaction_threshold,
            parse_f64
        );
        if let Some(v) = map.get("bge.endpoint") {
            config.bge_endpoint = Some(v.clone());
        }
        parse_into!(map, "reranker.enabled", config.reranker_enabled, parse_bool);
        if let Some(v) = map.get("reranker.base.url") {
            config.reranker_base_url = Some(v.clone());
        }
        parse_into!(
            map,
            "reranker.threshold",
            config.reranker_threshold,
            parse_f64
        );
        parse_into!(map, "reranker.retry", config.reranker_retry, parse_u32);
        parse_into!(
            map,
            "self.evolution.enabled",
            config.self_evolution_enabled,
            parse_bool
        );
        parse_into!(
            map,
            "self.evolution.questions.per.iteration",
            config.self_evolution_questions_per_iteration,
            parse_u32
        );
        parse_into!(
            map,
            "self.evolution.max.exploration.steps",
            config.self_evolution_max_exploration_steps,
            parse_u32
        );
        parse_into!(
            map,
            "self.evolution.interval.ms",
            config.self_evolution_interval_ms,
            parse_u64
        );
        parse_into!(
            map,
            "vector.db.l1.cache.size",
            config.vector_db_l1_cache_size,
            parse_usize
        );
        parse_into!(map, "concurrency.bge", config.concurrency_bge, parse_usize);
        parse_into!(map, "concurrency.llm", config.concurrency_llm, parse_usize);
        parse_into!(
            map,
            "concurrency.rerank",
            config.concurrency_rerank,
            parse_usize
        );
        parse_into!(
            map,
            "concurrency.analysis",
            config.concurrency_analysis,
            parse_usize
        );
        parse_into!(
            map,
            "doomloop.baseMs",
            config.doomloop_base_ms,
            parse_u64
        );
        parse_into!(map, "doomloop.capMs", config.doomloop_cap_ms, parse_u64);
        parse_into!(
            map,
            "doomloop.dailyQuota",
            config.doomloop_daily_quota,
            parse_u32
        );

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_values() {
        let c = NeuronConfig::default();
        assert_eq!(c.react_max_steps, 25);
        assert!(!c.react_enable_streaming);
        assert_eq!(c.concurrency_bge, 4);
        assert_eq!(c.concurrency_llm, 2);
        assert_eq!(c.concurrency_rerank, 2);
    }

    #[test]
    fn from_flat_overrides_only_present_keys() {
        let mut map = HashMap::new();
        map.insert("react.max.steps".to_string(), "40".to_string());
        map.insert("self.evolution.enabled".to_string(), "true".to_string());
        let c = NeuronConfig::from_flat(&map).unwrap();
        assert_eq!(c.react_max_steps, 40);
        assert!(c.self_evolution_enabled);
        // Untouched keys keep their defaults.
        assert_eq!(c.concurrency_llm, 2);
    }

    #[test]
    fn from_flat_rejects_invalid_value() {
        let mut map = HashMap::new();
        map.insert("react.max.steps".to_string(), "not-a-number".to_string());
        let err = NeuronConfig::from_flat(&map).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key, .. } if key == "react.max.steps"));
    }

    #[test]
    fn from_flat_ignores_unknown_keys() {
        let mut map = HashMap::new();
        map.insert("some.unknown.key".to_string(), "x".to_string());
        let c = NeuronConfig::from_flat(&map).unwrap();
        assert_eq!(c, NeuronConfig::default());
    }
}
