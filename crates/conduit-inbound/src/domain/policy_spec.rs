//! # Error Policy Specifications
//!
//! Configuration form of [`ErrorPolicy`], loaded from JSON:
//!
//! ```json
//! [
//!   { "type": "retry", "max_attempts": 3, "initial_delay_ms": 100, "delay_increment_ms": 100 },
//!   { "type": "move", "target": "orders-dlq", "apply_to": ["handler"] },
//!   { "type": "skip" }
//! ]
//! ```
//!
//! A list with several entries becomes a chain evaluated in order. Move
//! targets are resolved by endpoint name when the specification is built.

use super::policy::ErrorPolicy;
use conduit_types::{ConfigError, Endpoint, FailureKind};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ErrorPolicySpec {
    Retry {
        max_attempts: u32,
        #[serde(default)]
        initial_delay_ms: u64,
        #[serde(default)]
        delay_increment_ms: u64,
        #[serde(default)]
        apply_to: Vec<FailureKind>,
        #[serde(default)]
        exclude: Vec<FailureKind>,
    },
    Skip {
        #[serde(default)]
        apply_to: Vec<FailureKind>,
        #[serde(default)]
        exclude: Vec<FailureKind>,
    },
    Move {
        target: String,
        #[serde(default)]
        apply_to: Vec<FailureKind>,
        #[serde(default)]
        exclude: Vec<FailureKind>,
    },
    Chain {
        policies: Vec<ErrorPolicySpec>,
        #[serde(default)]
        apply_to: Vec<FailureKind>,
        #[serde(default)]
        exclude: Vec<FailureKind>,
    },
}

impl ErrorPolicySpec {
    /// Parse an ordered list of specifications from JSON.
    pub fn parse_list(json: &str) -> Result<Vec<Self>, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::InvalidErrorPolicy(e.to_string()))
    }

    /// Build the policy, resolving move targets through `resolve`.
    pub fn build<F>(&self, resolve: &F) -> Result<ErrorPolicy, ConfigError>
    where
        F: Fn(&str) -> Option<Arc<Endpoint>>,
    {
        let (policy, apply_to, exclude) = match self {
            Self::Retry {
                max_attempts,
                initial_delay_ms,
                delay_increment_ms,
                apply_to,
                exclude,
            } => (
                ErrorPolicy::retry(*max_attempts).with_delay(
                    Duration::from_millis(*initial_delay_ms),
                    Duration::from_millis(*delay_increment_ms),
                ),
                apply_to,
                exclude,
            ),
            Self::Skip { apply_to, exclude } => (ErrorPolicy::skip(), apply_to, exclude),
            Self::Move {
                target,
                apply_to,
                exclude,
            } => {
                let endpoint =
                    resolve(target).ok_or_else(|| ConfigError::UnknownEndpoint(target.clone()))?;
                (ErrorPolicy::move_to(endpoint), apply_to, exclude)
            }
            Self::Chain {
                policies,
                apply_to,
                exclude,
            } => (build_chain(policies, resolve)?, apply_to, exclude),
        };

        let policy = apply_to
            .iter()
            .cloned()
            .fold(policy, |p, kind| p.apply_to(kind));
        let policy = exclude
            .iter()
            .cloned()
            .fold(policy, |p, kind| p.exclude(kind));

        policy.validate()?;
        Ok(policy)
    }
}

/// Build an ordered list of specifications into a single chain.
pub fn build_chain<F>(specs: &[ErrorPolicySpec], resolve: &F) -> Result<ErrorPolicy, ConfigError>
where
    F: Fn(&str) -> Option<Arc<Endpoint>>,
{
    let policies = specs
        .iter()
        .map(|spec| spec.build(resolve))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ErrorPolicy::chain(policies))
}
