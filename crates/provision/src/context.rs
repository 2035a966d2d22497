//! Run callbacks
//!
//! These traits let callers observe and gate a run without the core
//! depending on any particular UI.

use crate::diff::Plan;
use crate::operation::Operation;
use crate::report::Status;

/// Progress callback for a provisioning run.
///
/// Implement this trait to receive progress updates during execution.
pub trait ProgressCallback {
    /// Called before the cluster is inspected
    fn on_inspect_start(&mut self) {}

    /// Called once the plan is known, before any statement is sent
    fn on_plan(&mut self, _operations: usize, _dry_run: bool) {}

    /// Called when starting to apply a single operation
    fn on_operation_start(&mut self, operation: &Operation, statement: &str);

    /// Called when an operation completes, successfully or not
    fn on_operation_complete(&mut self, operation: &Operation, status: Status);

    /// Called after the last operation
    fn on_finish(&mut self) {}
}

/// Confirmation callback for user interaction
pub trait ConfirmCallback {
    /// Ask the user to confirm applying `plan`. Only called for non-empty
    /// plans outside dry runs.
    ///
    /// # Returns
    /// `true` if the user confirmed, `false` otherwise. Implementations that
    /// cannot ask should decline.
    fn confirm(&mut self, plan: &Plan) -> bool;
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_operation_start(&mut self, _operation: &Operation, _statement: &str) {}
    fn on_operation_complete(&mut self, _operation: &Operation, _status: Status) {}
}

/// Auto-confirm callback (always returns true)
pub struct AutoConfirm;

impl ConfirmCallback for AutoConfirm {
    fn confirm(&mut self, _plan: &Plan) -> bool {
        true
    }
}

/// Auto-decline callback (always returns false)
pub struct AutoDecline;

impl ConfirmCallback for AutoDecline {
    fn confirm(&mut self, _plan: &Plan) -> bool {
        false
    }
}
