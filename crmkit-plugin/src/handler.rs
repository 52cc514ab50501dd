//! Handler traits implemented by plugin authors.

use crate::execution::FromExecution;
use crate::filter::HandlerFilter;
use crate::PluginResult;
use crmkit_container::Injectable;

/// A unit of business logic run by the dispatcher.
///
/// Handlers are built through the container, so their constructor
/// dependencies (repositories, services) come from there. The event itself
/// reaches them as their [`Execution`](Self::Execution) view.
pub trait Handler: Injectable {
    /// View of the event this handler works with, e.g.
    /// [`EntityExecution<Account>`](crate::EntityExecution).
    type Execution: FromExecution + 'static;

    /// Messages and stages the handler applies to.
    fn filter() -> HandlerFilter {
        HandlerFilter::any()
    }

    /// Last-moment eligibility check, after the filter passed.
    fn can_work(&self, _execution: &Self::Execution) -> PluginResult<bool> {
        Ok(true)
    }
}

/// Side-effecting handler. The first failure aborts the pass.
pub trait WorkHandler: Handler {
    fn do_work(&self, execution: &Self::Execution) -> PluginResult<()>;
}

/// Handler that checks a rule. Every eligible validator runs; their
/// violations are reported together.
pub trait ValidationHandler: Handler {
    fn is_valid(&self, execution: &Self::Execution) -> PluginResult<bool>;

    /// Message reported when [`is_valid`](Self::is_valid) returns false.
    fn violation_message(&self) -> String;
}
