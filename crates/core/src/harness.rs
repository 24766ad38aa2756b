// Bringup - STM32F4 Board Bring-up Harness
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Small on-target style test runner.
//!
//! Tests are plain functions over a shared fixture. Each one runs between a
//! `before` and an `after` hook; assertions are soft, so a failing check marks
//! the test failed but the body keeps running. Only the first failure of a
//! test is reported.

use serde::Serialize;
use std::fmt;
use std::panic::Location;

pub type TestFn<Fx> = fn(&mut Fx, &mut Assertions);
pub type Hook<Fx> = fn(&mut Fx);

/// Register a test function under its own name at the current line.
#[macro_export]
macro_rules! test_case {
    ($body:path) => {
        $crate::harness::TestCase::new(stringify!($body), line!(), $body)
    };
}

pub struct TestCase<Fx> {
    pub name: &'static str,
    pub line: u32,
    pub body: TestFn<Fx>,
    pub ignore: Option<&'static str>,
}

impl<Fx> TestCase<Fx> {
    pub fn new(name: &'static str, line: u32, body: TestFn<Fx>) -> Self {
        Self {
            name,
            line,
            body,
            ignore: None,
        }
    }

    /// Skip the body (and both hooks), counting the test as ignored.
    pub fn ignored(mut self, reason: &'static str) -> Self {
        self.ignore = Some(reason);
        self
    }
}

impl<Fx> fmt::Debug for TestCase<Fx> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestCase")
            .field("name", &self.name)
            .field("line", &self.line)
            .field("ignore", &self.ignore)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub message: String,
    pub file: &'static str,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TestOutcome {
    Pass,
    Fail(Failure),
    Ignore { reason: String },
}

/// Assertion sink handed to every test body.
#[derive(Debug, Default)]
pub struct Assertions {
    failure: Option<Failure>,
    ignored: Option<String>,
}

impl Assertions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failed(&self) -> bool {
        self.failure.is_some()
    }

    pub fn failure(&self) -> Option<&Failure> {
        self.failure.as_ref()
    }

    #[track_caller]
    pub fn equal<T: PartialEq + fmt::Debug>(&mut self, expected: T, actual: T) {
        if expected != actual {
            self.record(format!("Expected {:?} Was {:?}", expected, actual));
        }
    }

    #[track_caller]
    pub fn equal_str(&mut self, expected: &str, actual: &str) {
        if expected != actual {
            self.record(format!("Expected \"{}\" Was \"{}\"", expected, actual));
        }
    }

    /// Passes when `|actual - expected| <= delta`. NaN never passes.
    #[track_caller]
    pub fn float_within(&mut self, delta: f64, expected: f64, actual: f64) {
        let diff = (actual - expected).abs();
        if !(diff <= delta) {
            self.record(format!("Expected {:.6} Was {:.6}", expected, actual));
        }
    }

    /// Compare only the bits selected by `mask`.
    #[track_caller]
    pub fn bits(&mut self, mask: u32, expected: u32, actual: u32) {
        if expected & mask != actual & mask {
            self.record(format!(
                "Expected 0x{:08X} Was 0x{:08X}",
                expected & mask,
                actual & mask
            ));
        }
    }

    #[track_caller]
    pub fn bits_high(&mut self, mask: u32, actual: u32) {
        self.bits(mask, u32::MAX, actual);
    }

    #[track_caller]
    pub fn bits_low(&mut self, mask: u32, actual: u32) {
        self.bits(mask, 0, actual);
    }

    #[track_caller]
    pub fn is_true(&mut self, condition: bool) {
        if !condition {
            self.record("Expected TRUE Was FALSE".to_string());
        }
    }

    #[track_caller]
    pub fn is_false(&mut self, condition: bool) {
        if condition {
            self.record("Expected FALSE Was TRUE".to_string());
        }
    }

    #[track_caller]
    pub fn fail(&mut self, message: impl Into<String>) {
        self.record(message.into());
    }

    pub fn ignore(&mut self, reason: impl Into<String>) {
        if self.ignored.is_none() {
            self.ignored = Some(reason.into());
        }
    }

    #[track_caller]
    fn record(&mut self, message: String) {
        if self.failure.is_some() {
            return;
        }
        let location = Location::caller();
        self.failure = Some(Failure {
            message,
            file: location.file(),
            line: location.line(),
        });
    }

    /// A failure outranks an ignore request made in the same test.
    fn into_outcome(self) -> TestOutcome {
        match (self.failure, self.ignored) {
            (Some(failure), _) => TestOutcome::Fail(failure),
            (None, Some(reason)) => TestOutcome::Ignore { reason },
            (None, None) => TestOutcome::Pass,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestResult {
    pub name: String,
    pub line: u32,
    pub outcome: TestOutcome,
}

impl TestResult {
    pub fn passed(&self) -> bool {
        self.outcome == TestOutcome::Pass
    }
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            TestOutcome::Pass => write!(f, "{}:{}:PASS", self.line, self.name),
            TestOutcome::Fail(failure) => {
                write!(f, "{}:{}:FAIL: {}", failure.line, self.name, failure.message)
            }
            TestOutcome::Ignore { reason } => {
                write!(f, "{}:{}:IGNORE: {}", self.line, self.name, reason)
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub suite: String,
    pub tests: u32,
    pub failures: u32,
    pub ignored: u32,
    pub results: Vec<TestResult>,
}

impl RunSummary {
    pub fn passed(&self) -> bool {
        self.failures == 0
    }

    /// Process exit status: the failure count, clamped to what a shell sees.
    pub fn exit_code(&self) -> u8 {
        u8::try_from(self.failures).unwrap_or(u8::MAX)
    }

    pub fn summary_line(&self) -> String {
        format!(
            "{} Tests {} Failures {} Ignored",
            self.tests, self.failures, self.ignored
        )
    }

    /// Closing block printed after the per-test lines.
    pub fn footer(&self) -> String {
        format!(
            "-----------------------\n{}\n{}",
            self.summary_line(),
            if self.passed() { "OK" } else { "FAIL" }
        )
    }
}

pub struct Runner<Fx> {
    suite: String,
    fixture: Fx,
    before: Option<Hook<Fx>>,
    after: Option<Hook<Fx>>,
    tests: Vec<TestCase<Fx>>,
}

impl<Fx> Runner<Fx> {
    pub fn new(suite: impl Into<String>, fixture: Fx) -> Self {
        Self {
            suite: suite.into(),
            fixture,
            before: None,
            after: None,
            tests: Vec::new(),
        }
    }

    pub fn before_each(mut self, hook: Hook<Fx>) -> Self {
        self.before = Some(hook);
        self
    }

    pub fn after_each(mut self, hook: Hook<Fx>) -> Self {
        self.after = Some(hook);
        self
    }

    pub fn add(&mut self, case: TestCase<Fx>) {
        self.tests.push(case);
    }

    pub fn tests(&self) -> &[TestCase<Fx>] {
        &self.tests
    }

    pub fn fixture(&self) -> &Fx {
        &self.fixture
    }

    pub fn run(&mut self) -> RunSummary {
        self.run_with(|_| {})
    }

    /// Run every registered test in order, handing each result to
    /// `on_result` as soon as it is known.
    pub fn run_with(&mut self, mut on_result: impl FnMut(&TestResult)) -> RunSummary {
        let mut summary = RunSummary {
            suite: self.suite.clone(),
            ..Default::default()
        };

        for case in &self.tests {
            summary.tests += 1;

            let outcome = if let Some(reason) = case.ignore {
                TestOutcome::Ignore {
                    reason: reason.to_string(),
                }
            } else {
                let mut asserts = Assertions::new();
                if let Some(before) = self.before {
                    before(&mut self.fixture);
                }
                (case.body)(&mut self.fixture, &mut asserts);
                if let Some(after) = self.after {
                    after(&mut self.fixture);
                }
                asserts.into_outcome()
            };

            match outcome {
                TestOutcome::Fail(_) => summary.failures += 1,
                TestOutcome::Ignore { .. } => summary.ignored += 1,
                TestOutcome::Pass => {}
            }
            tracing::debug!("{} -> {:?}", case.name, outcome);

            let result = TestResult {
                name: case.name.to_string(),
                line: case.line,
                outcome,
            };
            on_result(&result);
            summary.results.push(result);
        }

        summary
    }
}
