//! Build errors for transition tables.

use thiserror::Error;

/// A transition table that cannot be turned into a machine.
///
/// Raised only by [`TransitionTableBuilder::build`]; no machine instance can
/// exist for a table that failed validation.
///
/// [`TransitionTableBuilder::build`]: super::TransitionTableBuilder::build
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeclarationError {
    #[error("Initial state not specified. Call .initial(state) before .build()")]
    MissingInitialState,

    #[error("Multiple initial states declared: '{first}' and '{second}'")]
    MultipleInitialStates { first: String, second: String },

    #[error("State '{state}' is referenced but was never declared")]
    UndeclaredState { state: String },

    #[error("Rule for trigger {trigger} has no source state. Call .from(state)")]
    RuleWithoutSource { trigger: String },

    #[error("Trigger {trigger} has rules but no action. Call .action(trigger, f)")]
    MissingAction { trigger: String },

    #[error("Trigger {trigger} is bound to more than one action")]
    DuplicateAction { trigger: String },

    #[error("Trigger {trigger} has ambiguous rules in state '{state}'")]
    AmbiguousRule { state: String, trigger: String },

    #[error("No transitions defined. Add at least one rule or idempotent entry")]
    EmptyTable,

    #[error("State '{state}' is declared both final and fallback")]
    FinalFallback { state: String },
}
