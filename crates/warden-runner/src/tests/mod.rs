//! Test suites for the sandbox runner.

pub(crate) mod support;
