//! Timing and input tracing for record operations.

use serde::Serialize;
use std::borrow::Cow;
use std::time::Instant;
use tracing::{debug, trace, Level};

/// RAII guard that logs `"<context> called"` on creation and
/// `"<context> execution finished. Elapsed time: <ms>ms"` on drop.
///
/// Nothing is logged, and inputs are not serialized, unless debug logging
/// is enabled for the current subscriber.
#[must_use = "the scope logs its elapsed time when dropped"]
pub struct TraceScope {
    context: Cow<'static, str>,
    started: Instant,
    active: bool,
    inputs: usize,
}

impl TraceScope {
    pub fn enter(context: impl Into<Cow<'static, str>>) -> Self {
        let context = context.into();
        let active = tracing::enabled!(Level::DEBUG);
        if active {
            debug!("{context} called");
        }
        Self {
            context,
            started: Instant::now(),
            active,
            inputs: 0,
        }
    }

    /// Logs one input at trace level, serialized as JSON.
    pub fn input<T: Serialize + ?Sized>(mut self, name: &str, value: &T) -> Self {
        if self.active && tracing::enabled!(Level::TRACE) {
            if self.inputs == 0 {
                trace!("With input:");
            }
            trace!("    {name}: {}", serialize_input(value));
            self.inputs += 1;
        }
        self
    }

    pub fn context(&self) -> &str {
        &self.context
    }
}

impl Drop for TraceScope {
    fn drop(&mut self) {
        if self.active {
            let elapsed_ms = self.started.elapsed().as_secs_f64() * 1000.0;
            debug!(
                "{} execution finished. Elapsed time: {elapsed_ms:.3}ms",
                self.context
            );
        }
    }
}

fn serialize_input<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "[Could not serialize parameter]".to_string())
}
