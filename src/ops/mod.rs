//! Operators built on the tiling engine
//!
//! Each operator module supplies its operand contract, its strategies and its
//! fixed-layout operator section.

pub mod apply_adam_w;
pub mod reduce;
pub mod reverse_sequence;
pub mod rms_norm;

use crate::operand::OperatorSpec;
use crate::strategy::StrategyRegistry;
use crate::tiling_data::{TilingData, TilingLayout};

/// Operand and attribute contracts of every built-in operator
pub fn operator_specs() -> Vec<OperatorSpec> {
    vec![
        rms_norm::operator_spec(),
        reduce::operator_spec(reduce::REDUCE_SUM),
        reduce::operator_spec(reduce::REDUCE_MEAN),
        reverse_sequence::operator_spec(),
        apply_adam_w::operator_spec(),
    ]
}

/// Register every built-in strategy
pub fn register_strategies(registry: &mut StrategyRegistry) {
    rms_norm::register(registry);
    reduce::register(registry);
    reverse_sequence::register(registry);
    apply_adam_w::register(registry);
}

/// Operator section layout by operator name
pub fn section_layout(op: &str) -> Option<TilingLayout> {
    match op {
        rms_norm::OP_NAME => Some(rms_norm::RmsNormTilingData::LAYOUT),
        reduce::REDUCE_SUM | reduce::REDUCE_MEAN => Some(reduce::ReduceTilingData::LAYOUT),
        reverse_sequence::OP_NAME => {
            Some(reverse_sequence::ReverseSequenceTilingData::LAYOUT)
        }
        apply_adam_w::OP_NAME => Some(apply_adam_w::ApplyAdamWTilingData::LAYOUT),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_spec_has_strategies_and_layout() {
        let registry = StrategyRegistry::with_builtin_operators();
        for spec in operator_specs() {
            assert!(registry.contains(spec.op), "{} has no strategies", spec.op);
            assert!(section_layout(spec.op).is_some(), "{} has no layout", spec.op);
        }
    }

    #[test]
    fn test_reverse_sequence_priorities() {
        let registry = StrategyRegistry::with_builtin_operators();
        assert_eq!(
            registry.strategies_for(reverse_sequence::OP_NAME),
            vec![("ReverseSequenceBsa", 10_000), ("ReverseSequenceSimt", 5_000)]
        );
    }
}
