//! # Error Policy Engine
//!
//! Decides how a worker reacts when processing a message or a batch fails.
//!
//! | Policy | Applies while | Decision |
//! |--------|---------------|----------|
//! | `Retry` | `failed_attempts <= max_attempts` | `RetryAfter(initial + increment * (n - 1))` |
//! | `Skip` | always | `Commit` |
//! | `Move` | always | `MoveTo(target)` |
//! | `Chain` | any child applies | decision of the first applicable child |
//!
//! Every policy also carries a [`PolicyFilter`] on the failure kind and an
//! optional custom predicate. A failure no policy applies to is `Fatal`.
//!
//! The engine is stateless: the attempt counter lives in the worker and is
//! passed in through [`FailureContext`].

use conduit_types::{ConfigError, Endpoint, FailureKind, Offset, PartitionKey, ProcessingError};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Custom applicability predicate.
pub type FailurePredicate = Arc<dyn Fn(&ProcessingError, &FailureContext) -> bool + Send + Sync>;

/// What the worker knows about the failing unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureContext {
    pub endpoint: String,
    /// Failed attempts so far, including the current one.
    pub failed_attempts: u32,
    pub message_ids: Vec<String>,
    pub offsets: Vec<(PartitionKey, Offset)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Dispatch the same message or batch again after the delay.
    RetryAfter(Duration),
    /// Drop the failed messages and commit their offsets.
    Commit,
    /// Republish the failed messages to the endpoint, then commit.
    MoveTo(Arc<Endpoint>),
    /// Stop the worker without committing.
    Fatal,
}

/// Applicability filter shared by every policy variant.
#[derive(Clone, Default)]
pub struct PolicyFilter {
    include: Vec<FailureKind>,
    exclude: Vec<FailureKind>,
    predicate: Option<FailurePredicate>,
}

impl PolicyFilter {
    pub fn matches(&self, failure: &ProcessingError, context: &FailureContext) -> bool {
        if !self.include.is_empty() && !self.include.contains(&failure.kind) {
            return false;
        }
        if self.exclude.contains(&failure.kind) {
            return false;
        }
        self.predicate
            .as_ref()
            .map_or(true, |predicate| predicate(failure, context))
    }
}

impl fmt::Debug for PolicyFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyFilter")
            .field("include", &self.include)
            .field("exclude", &self.exclude)
            .field("predicate", &self.predicate.is_some())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub enum ErrorPolicyKind {
    Retry {
        max_attempts: u32,
        initial_delay: Duration,
        delay_increment: Duration,
    },
    Skip,
    Move {
        target: Arc<Endpoint>,
    },
    Chain(Vec<ErrorPolicy>),
}

#[derive(Debug, Clone)]
pub struct ErrorPolicy {
    kind: ErrorPolicyKind,
    filter: PolicyFilter,
}

impl Default for ErrorPolicy {
    /// An empty chain: every failure is fatal.
    fn default() -> Self {
        Self::chain(Vec::new())
    }
}

impl ErrorPolicy {
    fn new(kind: ErrorPolicyKind) -> Self {
        Self {
            kind,
            filter: PolicyFilter::default(),
        }
    }

    /// Retry immediately, up to `max_attempts` failed attempts.
    pub fn retry(max_attempts: u32) -> Self {
        Self::new(ErrorPolicyKind::Retry {
            max_attempts,
            initial_delay: Duration::ZERO,
            delay_increment: Duration::ZERO,
        })
    }

    pub fn skip() -> Self {
        Self::new(ErrorPolicyKind::Skip)
    }

    pub fn move_to(target: Arc<Endpoint>) -> Self {
        Self::new(ErrorPolicyKind::Move { target })
    }

    pub fn chain(policies: Vec<ErrorPolicy>) -> Self {
        Self::new(ErrorPolicyKind::Chain(policies))
    }

    /// Set the retry delays. No effect on other variants.
    #[must_use]
    pub fn with_delay(mut self, initial: Duration, increment: Duration) -> Self {
        if let ErrorPolicyKind::Retry {
            initial_delay,
            delay_increment,
            ..
        } = &mut self.kind
        {
            *initial_delay = initial;
            *delay_increment = increment;
        }
        self
    }

    /// Restrict the policy to failures of this kind. May be repeated.
    #[must_use]
    pub fn apply_to(mut self, kind: FailureKind) -> Self {
        self.filter.include.push(kind);
        self
    }

    /// Never apply the policy to failures of this kind.
    #[must_use]
    pub fn exclude(mut self, kind: FailureKind) -> Self {
        self.filter.exclude.push(kind);
        self
    }

    /// Apply the policy only when the predicate holds.
    #[must_use]
    pub fn apply_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&ProcessingError, &FailureContext) -> bool + Send + Sync + 'static,
    {
        self.filter.predicate = Some(Arc::new(predicate));
        self
    }

    pub fn kind(&self) -> &ErrorPolicyKind {
        &self.kind
    }

    /// Whether this policy handles the failure in its current context.
    pub fn can_handle(&self, failure: &ProcessingError, context: &FailureContext) -> bool {
        if !self.filter.matches(failure, context) {
            return false;
        }

        match &self.kind {
            ErrorPolicyKind::Retry { max_attempts, .. } => {
                context.failed_attempts <= *max_attempts
            }
            ErrorPolicyKind::Chain(children) => {
                children.iter().any(|c| c.can_handle(failure, context))
            }
            ErrorPolicyKind::Skip | ErrorPolicyKind::Move { .. } => true,
        }
    }

    pub fn apply(&self, failure: &ProcessingError, context: &FailureContext) -> Decision {
        if !self.can_handle(failure, context) {
            return Decision::Fatal;
        }

        match &self.kind {
            ErrorPolicyKind::Retry {
                initial_delay,
                delay_increment,
                ..
            } => {
                let step = context.failed_attempts.saturating_sub(1);
                Decision::RetryAfter(*initial_delay + *delay_increment * step)
            }
            ErrorPolicyKind::Skip => Decision::Commit,
            ErrorPolicyKind::Move { target } => Decision::MoveTo(Arc::clone(target)),
            ErrorPolicyKind::Chain(children) => children
                .iter()
                .find(|c| c.can_handle(failure, context))
                .map_or(Decision::Fatal, |c| c.apply(failure, context)),
        }
    }

    /// Reject policies that can never behave as configured.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match &self.kind {
            ErrorPolicyKind::Retry { max_attempts, .. } if *max_attempts < 1 => Err(
                ConfigError::InvalidErrorPolicy("retry max_attempts must be at least 1".into()),
            ),
            ErrorPolicyKind::Retry { .. } | ErrorPolicyKind::Skip => Ok(()),
            ErrorPolicyKind::Move { target } => target.validate(),
            ErrorPolicyKind::Chain(children) => children.iter().try_for_each(ErrorPolicy::validate),
        }
    }
}
