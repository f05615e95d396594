//! Structured reporting for runner lifecycle events.

use std::sync::Arc;

use warden_config::Config;
use warden_protocol::{FrameError, ParseError};

use crate::bootstrap::BootstrapError;
use crate::error::{LoadError, ProtocolViolation};
use crate::lifecycle::LIFECYCLE_TARGET;

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait LifecycleReporter: Send + Sync {
    /// Invoked after configuration and telemetry are in place.
    fn bootstrap_succeeded(&self, config: &Config);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked once the runner starts reading input.
    fn runner_starting(&self);

    /// Invoked before application source is handed to the sandbox.
    fn app_loading(&self);

    /// Invoked after the application loaded and the runner became ready.
    fn app_ready(&self, handlers: usize);

    /// Invoked when the application failed to load.
    fn load_failed(&self, error: &LoadError);

    /// Invoked when a record could not be framed.
    fn frame_rejected(&self, error: &FrameError);

    /// Invoked when a framed record could not be decoded.
    fn record_rejected(&self, error: &ParseError);

    /// Invoked for input not acceptable in the current state.
    fn protocol_violation(&self, violation: &ProtocolViolation);

    /// Invoked after the terminal record has been flushed.
    fn terminating(&self);

    /// Invoked when input ends before a terminal record.
    fn input_closed(&self);
}

impl<T> LifecycleReporter for Arc<T>
where
    T: LifecycleReporter + ?Sized,
{
    fn bootstrap_succeeded(&self, config: &Config) {
        (**self).bootstrap_succeeded(config);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }

    fn runner_starting(&self) {
        (**self).runner_starting();
    }

    fn app_loading(&self) {
        (**self).app_loading();
    }

    fn app_ready(&self, handlers: usize) {
        (**self).app_ready(handlers);
    }

    fn load_failed(&self, error: &LoadError) {
        (**self).load_failed(error);
    }

    fn frame_rejected(&self, error: &FrameError) {
        (**self).frame_rejected(error);
    }

    fn record_rejected(&self, error: &ParseError) {
        (**self).record_rejected(error);
    }

    fn protocol_violation(&self, violation: &ProtocolViolation) {
        (**self).protocol_violation(violation);
    }

    fn terminating(&self) {
        (**self).terminating();
    }

    fn input_closed(&self) {
        (**self).input_closed();
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredLifecycleReporter;

impl StructuredLifecycleReporter {
    /// Builds a new reporter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl LifecycleReporter for StructuredLifecycleReporter {
    fn bootstrap_succeeded(&self, config: &Config) {
        tracing::info!(
            target: LIFECYCLE_TARGET,
            event = "bootstrap_succeeded",
            log_filter = %config.log_filter(),
            log_format = %config.log_format(),
            pre_ready_policy = %config.pre_ready_policy(),
            max_record_bytes = config.max_record_bytes(),
            "runner bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: LIFECYCLE_TARGET,
            event = "bootstrap_failed",
            error = %error,
            "runner bootstrap failed"
        );
    }

    fn runner_starting(&self) {
        tracing::info!(
            target: LIFECYCLE_TARGET,
            event = "runner_starting",
            "starting sandbox runner"
        );
    }

    fn app_loading(&self) {
        tracing::info!(
            target: LIFECYCLE_TARGET,
            event = "app_loading",
            "loading application source"
        );
    }

    fn app_ready(&self, handlers: usize) {
        tracing::info!(
            target: LIFECYCLE_TARGET,
            event = "app_ready",
            handlers,
            "application ready"
        );
    }

    fn load_failed(&self, error: &LoadError) {
        tracing::error!(
            target: LIFECYCLE_TARGET,
            event = "load_failed",
            error = %error,
            "application failed to load"
        );
    }

    fn frame_rejected(&self, error: &FrameError) {
        tracing::warn!(
            target: LIFECYCLE_TARGET,
            event = "frame_rejected",
            error = %error,
            "dropping unframeable record"
        );
    }

    fn record_rejected(&self, error: &ParseError) {
        tracing::warn!(
            target: LIFECYCLE_TARGET,
            event = "record_rejected",
            error = %error,
            "dropping malformed record"
        );
    }

    fn protocol_violation(&self, violation: &ProtocolViolation) {
        tracing::warn!(
            target: LIFECYCLE_TARGET,
            event = "protocol_violation",
            violation = %violation,
            "rejecting out-of-order input"
        );
    }

    fn terminating(&self) {
        tracing::info!(
            target: LIFECYCLE_TARGET,
            event = "terminating",
            "terminal record flushed"
        );
    }

    fn input_closed(&self) {
        tracing::info!(
            target: LIFECYCLE_TARGET,
            event = "input_closed",
            "input closed before the application finished"
        );
    }
}
