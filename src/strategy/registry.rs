//! Strategy registry with priority-ordered selection

use super::{PlanContext, TilingStrategy};
use crate::error::{TilingError, TilingResult};
use crate::logging::PLAN_TARGET;
use std::collections::BTreeMap;
use tracing::debug;

/// Constructor registered for a strategy
pub type StrategyFactory = fn() -> Box<dyn TilingStrategy>;

struct RegisteredStrategy {
    priority: i64,
    factory: StrategyFactory,
    strategy: Box<dyn TilingStrategy>,
}

/// A strategy that declined the current invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub strategy: &'static str,
    pub priority: i64,
}

/// Outcome of a successful selection
pub struct Selection<'r> {
    pub strategy: &'r dyn TilingStrategy,
    pub priority: i64,
    /// Higher-priority strategies tried first, in order
    pub rejected: Vec<Rejection>,
}

/// Strategies per operator, kept in descending priority order
#[derive(Default)]
pub struct StrategyRegistry {
    operators: BTreeMap<String, Vec<RegisteredStrategy>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every operator this crate ships
    pub fn with_builtin_operators() -> Self {
        let mut registry = Self::new();
        crate::ops::register_strategies(&mut registry);
        registry
    }

    /// Register a strategy; equal priorities keep registration order
    pub fn register(&mut self, op: impl Into<String>, factory: StrategyFactory, priority: i64) {
        let entries = self.operators.entry(op.into()).or_default();
        let position = entries
            .iter()
            .position(|e| e.priority < priority)
            .unwrap_or(entries.len());
        entries.insert(
            position,
            RegisteredStrategy {
                priority,
                factory,
                strategy: factory(),
            },
        );
    }

    pub fn contains(&self, op: &str) -> bool {
        self.operators.contains_key(op)
    }

    pub fn operators(&self) -> impl Iterator<Item = &str> {
        self.operators.keys().map(String::as_str)
    }

    /// `(name, priority)` pairs in trial order
    pub fn strategies_for(&self, op: &str) -> Vec<(&'static str, i64)> {
        self.operators
            .get(op)
            .map(|entries| {
                entries
                    .iter()
                    .map(|e| (e.strategy.name(), e.priority))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Fresh instance of a registered strategy
    pub fn instantiate(&self, op: &str, name: &str) -> Option<Box<dyn TilingStrategy>> {
        self.operators
            .get(op)?
            .iter()
            .find(|e| e.strategy.name() == name)
            .map(|e| (e.factory)())
    }

    /// First capable strategy in descending priority order
    pub fn select(&self, ctx: &PlanContext<'_>) -> TilingResult<Selection<'_>> {
        let op = ctx.op();
        let entries = self
            .operators
            .get(op)
            .ok_or_else(|| TilingError::UnsupportedConfiguration {
                op: op.to_string(),
                detail: "no strategies registered".to_string(),
            })?;

        let mut rejected = Vec::new();
        for entry in entries {
            let name = entry.strategy.name();
            if entry.strategy.is_capable(ctx) {
                debug!(
                    target: PLAN_TARGET,
                    op,
                    strategy = name,
                    priority = entry.priority,
                    rejected = rejected.len(),
                    "strategy selected"
                );
                return Ok(Selection {
                    strategy: entry.strategy.as_ref(),
                    priority: entry.priority,
                    rejected,
                });
            }
            debug!(
                target: PLAN_TARGET,
                op,
                strategy = name,
                priority = entry.priority,
                "strategy declined"
            );
            rejected.push(Rejection {
                strategy: name,
                priority: entry.priority,
            });
        }

        let declined = rejected
            .iter()
            .map(|r| format!("{}({})", r.strategy, r.priority))
            .collect::<Vec<_>>()
            .join(", ");
        Err(TilingError::UnsupportedConfiguration {
            op: op.to_string(),
            detail: format!(
                "no strategy accepts [{}]; declined: {}",
                ctx.operands.describe(),
                declined
            ),
        })
    }
}
