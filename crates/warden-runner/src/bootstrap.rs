//! Runner bootstrap orchestration.

use std::io::{Read, Write};
use std::sync::Arc;

use ortho_config::{OrthoConfig, OrthoError};
use thiserror::Error;

use warden_config::Config;

use crate::lifecycle::{ExitStatus, LIFECYCLE_TARGET, Runner, RunnerOptions};
use crate::loader::Loader;
use crate::reporter::LifecycleReporter;
use crate::telemetry::{self, TelemetryError, TelemetryHandle};

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the runner configuration.
    ///
    /// # Errors
    ///
    /// Returns the loader's error when configuration cannot be resolved.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that delegates to [`Config::load`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load()
    }
}

/// Loader that always yields the configuration it was built with.
#[derive(Debug, Clone, Default)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps a fixed configuration.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

/// Errors surfaced during bootstrap.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
}

/// Result of a successful bootstrap invocation.
pub struct Session {
    config: Config,
    telemetry: TelemetryHandle,
    reporter: Arc<dyn LifecycleReporter>,
}

impl Session {
    /// Accessor for the resolved configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Accessor for the telemetry handle, primarily useful for testing.
    #[must_use]
    pub const fn telemetry(&self) -> TelemetryHandle {
        self.telemetry
    }

    /// Builds a runner over `output` using the bundled script sandbox.
    #[must_use]
    pub fn runner<W: Write>(&self, output: W) -> Runner<W> {
        self.runner_with(output, Loader::default())
    }

    /// Builds a runner over `output` using `loader`.
    #[must_use]
    pub fn runner_with<W: Write>(&self, output: W, loader: Loader) -> Runner<W> {
        Runner::new(
            RunnerOptions::from(&self.config),
            loader,
            output,
            Arc::clone(&self.reporter),
        )
    }

    /// Runs a complete session and maps its outcome to an exit status.
    #[must_use]
    pub fn run<R: Read, W: Write>(&self, input: R, output: W) -> ExitStatus {
        match self.runner(output).run(input) {
            Ok(status) => status,
            Err(error) => {
                tracing::error!(
                    target: LIFECYCLE_TARGET,
                    error = %error,
                    "protocol channel failed"
                );
                error.exit_status()
            }
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("telemetry", &self.telemetry)
            .finish_non_exhaustive()
    }
}

/// Bootstraps the runner using the supplied collaborators.
///
/// # Errors
///
/// Returns [`BootstrapError`] when configuration or telemetry cannot be set
/// up. The reporter observes the failure before it is returned.
pub fn bootstrap_with(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn LifecycleReporter>,
) -> Result<Session, BootstrapError> {
    let config = match loader.load() {
        Ok(config) => config,
        Err(source) => {
            let error = BootstrapError::Configuration { source };
            reporter.bootstrap_failed(&error);
            return Err(error);
        }
    };

    let telemetry = match telemetry::initialise(&config) {
        Ok(handle) => handle,
        Err(source) => {
            let error = BootstrapError::Telemetry { source };
            reporter.bootstrap_failed(&error);
            return Err(error);
        }
    };

    reporter.bootstrap_succeeded(&config);
    Ok(Session {
        config,
        telemetry,
        reporter,
    })
}
