//! Cooperative cancellation.
//!
//! Every operation in the engine is a synchronous computation made
//! cancellable by periodic polling; the traversal driver, scope builder,
//! type handlers, and autocomplete inspectors poll a token between steps.
//! Cancellation has no cleanup obligations.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use thiserror::Error;

/// The error produced when an operation observes a cancelled token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("the operation was cancelled")]
pub struct Cancelled;

/// A pluggable cancellation token.
pub trait CancellationToken: fmt::Debug + Send + Sync {
    /// Determines if cancellation has been requested.
    fn is_cancelled(&self) -> bool;

    /// Returns an error if cancellation has been requested.
    fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Polls an optional cancellation token.
///
/// When no token is configured, no cancellation check fires.
pub fn check(token: Option<&Arc<dyn CancellationToken>>) -> Result<(), Cancelled> {
    match token {
        Some(token) => token.check(),
        None => Ok(()),
    }
}

/// A token cancelled by flipping a flag.
#[derive(Debug, Default)]
pub struct ManualToken {
    /// Whether cancellation has been requested.
    cancelled: AtomicBool,
}

impl ManualToken {
    /// Creates a new, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }
}

impl CancellationToken for ManualToken {
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// A token that reports cancelled after a fixed number of polls.
///
/// Useful in tests for firing cancellation at a precise point in a
/// traversal or inspection.
#[derive(Debug)]
pub struct CountdownToken {
    /// The number of polls remaining before the token reports cancelled.
    remaining: AtomicUsize,
}

impl CountdownToken {
    /// Creates a token that reports cancelled after `polls` polls.
    pub fn new(polls: usize) -> Self {
        Self {
            remaining: AtomicUsize::new(polls),
        }
    }
}

impl CancellationToken for CountdownToken {
    fn is_cancelled(&self) -> bool {
        // Saturate at zero so repeated polls stay cancelled.
        self.remaining
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_err()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn countdown_fires_once_exhausted() {
        let token = CountdownToken::new(2);
        assert!(!token.is_cancelled());
        assert!(!token.is_cancelled());
        assert!(token.is_cancelled());
        assert!(token.is_cancelled());
    }

    #[test]
    fn manual_token_cancels() {
        let token = ManualToken::new();
        assert!(token.check().is_ok());
        token.cancel();
        assert_eq!(token.check(), Err(Cancelled));
    }
}
