//! One dispatch pass: validation phase, then work phase.

use crate::execution::PluginExecution;
use crate::registry::{HandlerKind, HandlerRegistration, HandlerRegistry};
use crate::{PluginError, PluginResult};
use crmkit_container::Container;
use std::backtrace::Backtrace;
use std::error::Error as _;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Lifecycle of a [`DispatchPass`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassState {
    Start,
    ValidationPhase,
    WorkPhase,
    Done,
    Aborted,
}

/// Why a registered handler did not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    FiltersNotFulfilled,
    CannotWork,
}

/// What happened during a pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchReport {
    /// Handlers whose validity check or work method was invoked, in order.
    pub executed: Vec<&'static str>,
    pub skipped: Vec<(&'static str, SkipReason)>,
    pub violations: Vec<String>,
    /// Elapsed time of every invoked work handler, failed ones included.
    pub timings: Vec<(&'static str, Duration)>,
}

impl DispatchReport {
    pub fn was_executed(&self, name: &str) -> bool {
        self.executed.iter().any(|executed| *executed == name)
    }

    pub fn skip_reason(&self, name: &str) -> Option<SkipReason> {
        self.skipped
            .iter()
            .find(|(skipped, _)| *skipped == name)
            .map(|(_, reason)| *reason)
    }
}

/// Runs the handlers of a registry against one event.
///
/// Handlers run strictly in registration order on the calling thread. Every
/// eligible validator runs; violations abort the pass before any work
/// handler. The first failing work handler aborts the pass.
pub struct DispatchPass<'a> {
    registry: &'a HandlerRegistry,
    container: &'a Container,
    base: PluginExecution,
    state: PassState,
    report: DispatchReport,
}

impl<'a> DispatchPass<'a> {
    pub fn new(registry: &'a HandlerRegistry, container: &'a Container, base: PluginExecution) -> Self {
        Self {
            registry,
            container,
            base,
            state: PassState::Start,
            report: DispatchReport::default(),
        }
    }

    pub fn state(&self) -> PassState {
        self.state
    }

    pub fn report(&self) -> &DispatchReport {
        &self.report
    }

    pub fn into_report(self) -> DispatchReport {
        self.report
    }

    /// Runs the pass to completion or abort. Can be called once.
    pub fn run(&mut self) -> PluginResult<()> {
        if self.state != PassState::Start {
            return Err(PluginError::invalid("dispatch pass has already run"));
        }

        self.state = PassState::ValidationPhase;
        if let Err(e) = self.run_validation() {
            self.state = PassState::Aborted;
            return Err(e);
        }

        self.state = PassState::WorkPhase;
        if let Err(e) = self.run_work() {
            self.state = PassState::Aborted;
            return Err(e);
        }

        self.state = PassState::Done;
        Ok(())
    }

    fn run_validation(&mut self) -> PluginResult<()> {
        let registry = self.registry;
        for registration in registry.of_kind(HandlerKind::Validation) {
            if let Err(e) = self.validate_one(registration) {
                trace_unexpected(&e, "ValidationHandler");
                return Err(e);
            }
        }

        if self.report.violations.is_empty() {
            return Ok(());
        }
        info!(count = self.report.violations.len(), "Validation failed");
        Err(PluginError::ValidationFailed {
            violations: self.report.violations.clone(),
        })
    }

    fn validate_one(&mut self, registration: &HandlerRegistration) -> PluginResult<()> {
        let name = registration.name();
        if !self.filters_fulfilled(registration) {
            info!("Filters not fulfilled. Ommiting {name} validation handler execution");
            self.report.skipped.push((name, SkipReason::FiltersNotFulfilled));
            return Ok(());
        }

        let Some(bound) = registration.bind_validation(self.container, self.base.clone()) else {
            return Ok(());
        };
        let handler = bound?;
        if !handler.can_work()? {
            info!("Could not work. Ommiting {name} validation handler execution");
            self.report.skipped.push((name, SkipReason::CannotWork));
            return Ok(());
        }

        self.report.executed.push(name);
        if handler.is_valid()? {
            debug!(handler = name, "Validation passed");
        } else {
            let violation = handler.violation_message();
            debug!(handler = name, violation = %violation, "Validation violated");
            self.report.violations.push(violation);
        }
        Ok(())
    }

    fn run_work(&mut self) -> PluginResult<()> {
        let registry = self.registry;
        for registration in registry.of_kind(HandlerKind::Work) {
            let executed_before = self.report.executed.len();
            let started = Instant::now();
            let outcome = self.work_one(registration);
            let elapsed = started.elapsed();
            info!("    Execution time: {} ms.", elapsed.as_millis());

            if self.report.executed.len() > executed_before {
                self.report.timings.push((registration.name(), elapsed));
            }
            outcome.map_err(classify_work_error)?;
        }
        Ok(())
    }

    fn work_one(&mut self, registration: &HandlerRegistration) -> PluginResult<()> {
        let name = registration.name();
        if !self.filters_fulfilled(registration) {
            info!("Filters not fulfilled. Ommiting {name} handler execution");
            self.report.skipped.push((name, SkipReason::FiltersNotFulfilled));
            return Ok(());
        }

        let Some(bound) = registration.bind_work(self.container, self.base.clone()) else {
            return Ok(());
        };
        let handler = bound?;
        if !handler.can_work()? {
            info!("Could not work. Ommiting {name} handler execution");
            self.report.skipped.push((name, SkipReason::CannotWork));
            return Ok(());
        }

        info!(
            "Can work. Invoking {name} handler execution. Context depth: {}",
            self.base.depth()
        );
        self.report.executed.push(name);
        handler.do_work()
    }

    fn filters_fulfilled(&self, registration: &HandlerRegistration) -> bool {
        registration.filter().is_fulfilled(self.base.context().as_ref())
    }
}

/// Security failures become business-rule failures; business-rule failures
/// pass through; anything else is traced and passed through.
fn classify_work_error(e: PluginError) -> PluginError {
    if e.is_security() {
        let detail = Backtrace::capture().to_string();
        info!("Plug-in failed with Security Exception: {e} {detail}");
        return PluginError::Security {
            message: e.to_string(),
            detail,
        };
    }
    if !e.is_business_rule() {
        trace_unexpected(&e, "WorkHandler");
    }
    e
}

fn trace_unexpected(e: &PluginError, source: &str) {
    error!("{e}");
    if let Some(inner) = e.source() {
        error!("Source: {source}. {inner}");
    }
}
