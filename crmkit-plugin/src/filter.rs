//! Message and stage filters declared per handler.

use crate::context::ExecutionContext;
use crate::TARGET;
use crmkit_types::{MessageName, ProcessingStage};
use std::collections::BTreeSet;
use tracing::trace;

/// Messages and stages a handler applies to. An undeclared set matches
/// everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandlerFilter {
    messages: Option<BTreeSet<MessageName>>,
    stages: Option<BTreeSet<ProcessingStage>>,
}

impl HandlerFilter {
    /// Filter that accepts every event.
    pub fn any() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn messages(mut self, messages: impl IntoIterator<Item = MessageName>) -> Self {
        self.messages = Some(messages.into_iter().collect());
        self
    }

    #[must_use]
    pub fn stages(mut self, stages: impl IntoIterator<Item = ProcessingStage>) -> Self {
        self.stages = Some(stages.into_iter().collect());
        self
    }

    pub fn declared_messages(&self) -> Option<&BTreeSet<MessageName>> {
        self.messages.as_ref()
    }

    pub fn declared_stages(&self) -> Option<&BTreeSet<ProcessingStage>> {
        self.stages.as_ref()
    }

    /// Whether a handler with this filter may run for `context`.
    ///
    /// Events without a `Target` input always pass. Otherwise both the
    /// message and the stage must match. Message names are parsed
    /// case-sensitively; unknown names and unknown stage codes never match.
    pub fn is_fulfilled(&self, context: &dyn ExecutionContext) -> bool {
        if !context.contains_input(TARGET) {
            return true;
        }
        self.message_matches(context.message_name()) && self.stage_matches(context.stage())
    }

    fn message_matches(&self, raw: &str) -> bool {
        let Some(messages) = &self.messages else {
            return true;
        };
        match raw.parse::<MessageName>() {
            Ok(message) => messages.contains(&message),
            Err(_) => {
                trace!(message = raw, "Unknown message name in filter");
                false
            }
        }
    }

    fn stage_matches(&self, code: i32) -> bool {
        let Some(stages) = &self.stages else {
            return true;
        };
        match ProcessingStage::from_code(code) {
            Some(stage) => stages.contains(&stage),
            None => {
                trace!(stage = code, "Unknown stage code in filter");
                false
            }
        }
    }
}
