//! Connection error budget shared by one acquisition run.

use std::sync::atomic::{AtomicUsize, Ordering};

use tokio_util::sync::CancellationToken;

/// Counts transport failures; reaching the limit cancels the run
pub(crate) struct ConnectionBudget {
    max_errors: usize,
    errors: AtomicUsize,
    cancel_token: CancellationToken,
}

impl ConnectionBudget {
    pub(crate) fn new(max_errors: usize, cancel_token: CancellationToken) -> Self {
        Self {
            max_errors,
            errors: AtomicUsize::new(0),
            cancel_token,
        }
    }

    /// Record one connection error
    pub(crate) fn record(&self, context: &str) {
        let errors = self.errors.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::warn!(
            context,
            errors,
            budget = self.max_errors,
            "Connection error"
        );
        if errors >= self.max_errors && !self.cancel_token.is_cancelled() {
            tracing::error!(
                errors,
                budget = self.max_errors,
                "Connection error budget exhausted, cancelling run"
            );
            self.cancel_token.cancel();
        }
    }

    pub(crate) fn errors(&self) -> usize {
        self.errors.load(Ordering::SeqCst)
    }

    pub(crate) fn max_errors(&self) -> usize {
        self.max_errors
    }

    pub(crate) fn is_exhausted(&self) -> bool {
        self.errors() >= self.max_errors
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausting_the_budget_cancels() {
        let token = CancellationToken::new();
        let budget = ConnectionBudget::new(2, token.clone());

        budget.record("first");
        assert!(!token.is_cancelled());
        assert!(!budget.is_exhausted());

        budget.record("second");
        assert!(token.is_cancelled());
        assert!(budget.is_exhausted());
        assert_eq!(budget.errors(), 2);
    }
}
