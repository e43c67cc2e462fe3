//! Table-driven test cases.
//!
//! A [`CaseTable`] runs the same check over a list of named inputs. Every
//! case runs even when earlier ones fail; failures are reported together in
//! one panic at the end.

use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};

/// One failed case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseFailure {
    /// Case identifier.
    pub id: String,
    /// Panic message raised by the case.
    pub message: String,
}

impl fmt::Display for CaseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.id, self.message)
    }
}

/// Named list of test inputs.
#[derive(Debug, Clone)]
pub struct CaseTable<C> {
    name: String,
    cases: Vec<(String, C)>,
}

impl<C> CaseTable<C> {
    /// Create an empty table.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cases: Vec::new(),
        }
    }

    /// Add a case.
    #[must_use]
    pub fn case(mut self, id: impl Into<String>, input: C) -> Self {
        self.cases.push((id.into(), input));
        self
    }

    /// Number of cases.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cases.len()
    }

    /// Returns true if the table has no cases.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// Run `check` on every case and collect the failures.
    pub fn collect_failures<F>(&self, check: F) -> Vec<CaseFailure>
    where
        F: Fn(&C),
    {
        self.cases
            .iter()
            .filter_map(|(id, input)| {
                let outcome = catch_unwind(AssertUnwindSafe(|| check(input)));
                outcome.err().map(|payload| {
                    tracing::debug!(table = %self.name, case = %id, "case failed");
                    CaseFailure {
                        id: id.clone(),
                        message: panic_message(payload.as_ref()),
                    }
                })
            })
            .collect()
    }

    /// Run `check` on every case; panic listing every failure, if any.
    pub fn run<F>(&self, check: F)
    where
        F: Fn(&C),
    {
        let failures = self.collect_failures(check);
        if !failures.is_empty() {
            let report = failures
                .iter()
                .map(|f| format!("  {f}"))
                .collect::<Vec<_>>()
                .join("\n");
            panic!(
                "{}: {} of {} cases failed\n{report}",
                self.name,
                failures.len(),
                self.cases.len()
            );
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        String::from("non-string panic payload")
    }
}
