//! Behavioural tests for configuration layering.

use std::cell::RefCell;
use std::ffi::OsString;
use std::fs;
use std::sync::{Mutex, MutexGuard};

use once_cell::sync::Lazy;
use ortho_config::OrthoConfig;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use tempfile::TempDir;

use warden_config::{Config, PreReadyPolicy};

static ENV_MUTEX: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

struct Harness {
    temp_dir: TempDir,
    config_lines: RefCell<Vec<String>>,
    cli_args: RefCell<Vec<OsString>>,
    env_overrides: RefCell<Vec<(String, Option<OsString>)>>,
    loaded: RefCell<Option<Config>>,
    error: RefCell<Option<String>>,
    _guard: MutexGuard<'static, ()>,
}

impl Harness {
    fn new() -> Self {
        let guard = ENV_MUTEX
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let temp_dir = match TempDir::new() {
            Ok(dir) => dir,
            Err(error) => panic!("failed to create temporary directory: {error}"),
        };
        Self {
            temp_dir,
            config_lines: RefCell::new(Vec::new()),
            cli_args: RefCell::new(vec![OsString::from("warden-runner")]),
            env_overrides: RefCell::new(Vec::new()),
            loaded: RefCell::new(None),
            error: RefCell::new(None),
            _guard: guard,
        }
    }

    fn add_config_line(&self, line: String) {
        self.config_lines.borrow_mut().push(line);
    }

    fn set_env(&self, key: &str, value: &str) {
        let previous = std::env::var_os(key);
        // Environment mutation is `unsafe` in edition 2024. The harness holds
        // the environment mutex and restores overrides in `Drop`.
        unsafe { std::env::set_var(key, value) };
        self.env_overrides
            .borrow_mut()
            .push((key.to_owned(), previous));
    }

    fn push_cli_arg(&self, arg: impl Into<OsString>) {
        self.cli_args.borrow_mut().push(arg.into());
    }

    fn load(&self) {
        let lines = self.config_lines.borrow();
        let mut args = self.cli_args.borrow().clone();
        if !lines.is_empty() {
            let path = self.temp_dir.path().join("warden.toml");
            if let Err(error) = fs::write(&path, lines.join("\n")) {
                panic!("failed to write configuration: {error}");
            }
            args.insert(1, OsString::from("--config-path"));
            args.insert(2, path.into_os_string());
        }

        match Config::load_from_iter(args) {
            Ok(config) => *self.loaded.borrow_mut() = Some(config),
            Err(error) => *self.error.borrow_mut() = Some(error.to_string()),
        }
    }

    fn config(&self) -> Config {
        if let Some(error) = self.error.borrow().as_ref() {
            panic!("configuration failed to load: {error}");
        }
        match self.loaded.borrow().as_ref() {
            Some(config) => config.clone(),
            None => panic!("configuration was not loaded"),
        }
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        let mut overrides = self.env_overrides.borrow_mut();
        while let Some((key, value)) = overrides.pop() {
            if let Some(os_value) = value {
                unsafe { std::env::set_var(&key, os_value) };
            } else {
                unsafe { std::env::remove_var(&key) };
            }
        }
    }
}

#[fixture]
fn harness() -> Harness {
    Harness::new()
}

#[given("a configuration file setting the pre-ready policy to \"{policy}\"")]
fn given_file_policy(harness: &Harness, policy: String) {
    harness.add_config_line(format!("pre_ready_policy = \"{policy}\""));
}

#[given("a configuration file setting the log filter to \"{filter}\"")]
fn given_file_filter(harness: &Harness, filter: String) {
    harness.add_config_line(format!("log_filter = \"{filter}\""));
}

#[given("the environment overrides the log filter to \"{filter}\"")]
fn given_env_filter(harness: &Harness, filter: String) {
    harness.set_env("WARDEN_LOG_FILTER", &filter);
}

#[given("the command line sets the log filter to \"{filter}\"")]
fn given_cli_filter(harness: &Harness, filter: String) {
    harness.push_cli_arg("--log-filter");
    harness.push_cli_arg(filter);
}

#[when("the configuration is loaded")]
fn when_loaded(harness: &Harness) {
    harness.load();
}

#[then("the pre-ready policy is \"{policy}\"")]
fn then_policy(harness: &Harness, policy: String) {
    let expected = match policy.parse::<PreReadyPolicy>() {
        Ok(parsed) => parsed,
        Err(error) => panic!("invalid expected policy '{policy}': {error}"),
    };
    assert_eq!(harness.config().pre_ready_policy(), expected);
}

#[then("the log filter is \"{filter}\"")]
fn then_filter(harness: &Harness, filter: String) {
    assert_eq!(harness.config().log_filter(), filter);
}

#[scenario(
    path = "tests/features/configuration_precedence.feature",
    name = "Defaults apply when nothing is configured"
)]
fn defaults_apply(#[from(harness)] harness: Harness) {
    drop(harness);
}

#[scenario(
    path = "tests/features/configuration_precedence.feature",
    name = "The configuration file overrides defaults"
)]
fn file_overrides_defaults(#[from(harness)] harness: Harness) {
    drop(harness);
}

#[scenario(
    path = "tests/features/configuration_precedence.feature",
    name = "The environment overrides the configuration file"
)]
fn environment_overrides_file(#[from(harness)] harness: Harness) {
    drop(harness);
}

#[scenario(
    path = "tests/features/configuration_precedence.feature",
    name = "Command-line flags override the environment"
)]
fn cli_overrides_environment(#[from(harness)] harness: Harness) {
    drop(harness);
}
