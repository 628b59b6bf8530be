//! Per-invocation planning state machine

use crate::error::{TilingError, TilingResult};
use std::fmt;

/// Where one planning invocation stands
///
/// Stages only move forward, one step at a time. Any non-terminal stage may
/// drop into `Failed`; `Serialized` and `Failed` are terminal.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PlanStage {
    #[default]
    Idle,
    ShapeExtracted,
    StrategySelected,
    Partitioned,
    Sized,
    Serialized,
    Failed(String),
}

impl PlanStage {
    fn ordinal(&self) -> Option<u8> {
        match self {
            PlanStage::Idle => Some(0),
            PlanStage::ShapeExtracted => Some(1),
            PlanStage::StrategySelected => Some(2),
            PlanStage::Partitioned => Some(3),
            PlanStage::Sized => Some(4),
            PlanStage::Serialized => Some(5),
            PlanStage::Failed(_) => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PlanStage::Serialized | PlanStage::Failed(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, PlanStage::Failed(_))
    }

    /// Move to the next stage; skipping or re-entering is a bug
    pub fn advance(&mut self, next: PlanStage) -> TilingResult<()> {
        let legal = match (self.ordinal(), next.ordinal()) {
            (Some(from), Some(to)) => to == from + 1,
            (Some(_), None) => !self.is_terminal(),
            (None, _) => false,
        };
        if !legal {
            return Err(TilingError::Internal(format!(
                "illegal plan stage transition {self} -> {next}"
            )));
        }
        *self = next;
        Ok(())
    }

    /// Terminal failure; a stage that already finished stays as it is
    pub fn fail(&mut self, reason: impl Into<String>) {
        if !self.is_terminal() {
            *self = PlanStage::Failed(reason.into());
        }
    }
}

impl fmt::Display for PlanStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanStage::Idle => write!(f, "Idle"),
            PlanStage::ShapeExtracted => write!(f, "ShapeExtracted"),
            PlanStage::StrategySelected => write!(f, "StrategySelected"),
            PlanStage::Partitioned => write!(f, "Partitioned"),
            PlanStage::Sized => write!(f, "Sized"),
            PlanStage::Serialized => write!(f, "Serialized"),
            PlanStage::Failed(reason) => write!(f, "Failed({reason})"),
        }
    }
}
