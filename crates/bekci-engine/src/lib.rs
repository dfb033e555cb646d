//! Rule evaluation engine.
//!
//! After every saved probe result the engine re-derives the state of each
//! rule referencing the producing check: conditions are evaluated over the
//! latest (or a window of recent) results, combined with the rule's AND/OR
//! operator, and state transitions are written and handed to the
//! [`TransitionSink`].

pub mod engine;

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use bekci_common::types::HealthState;

pub use engine::RuleEngine;

/// Receives rule state transitions as they are written.
///
/// The alert dispatcher implements this; tests plug in a recorder. Duplicate
/// adjacent transitions can occur when several checks back one rule — the
/// sink is expected to absorb them (the dispatcher's cooldown does).
#[async_trait]
pub trait TransitionSink: Send + Sync {
    async fn dispatch(&self, rule_id: &str, old_state: HealthState, new_state: HealthState);
}
