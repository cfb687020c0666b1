//! Detection rule contract shared by every provider.
//!
//! A provider's registry is a closed, ordered list of rule implementations
//! resolved at startup. Each rule is pure given its inputs (network calls
//! aside), shares no mutable state with its siblings, and is safe to run
//! concurrently with every other rule in the registry. Registry order has
//! no semantic effect; it only makes logging deterministic.

use futures::future::BoxFuture;
use thiserror::Error;

use crate::finding::Finding;

/// Why a single rule invocation failed.
///
/// The distinction matters to the target scanner: a target where every rule
/// fails with `Connectivity` is treated as an invalid or unreachable target,
/// while isolated failures of any kind are recoverable noise.
#[derive(Debug, Error)]
pub enum RuleError {
    /// Endpoint unreachable, DNS failure, timed-out dispatch. The strongest
    /// signal that the target itself (e.g. a mistyped region) is broken.
    #[error("connectivity error: {0}")]
    Connectivity(String),

    /// The credential lacks a permission this rule needs.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Any other provider API failure (throttling, malformed response, ...).
    #[error("api error: {0}")]
    Api(String),
}

impl RuleError {
    pub fn is_connectivity(&self) -> bool {
        matches!(self, RuleError::Connectivity(_))
    }

    pub fn is_permission(&self) -> bool {
        matches!(self, RuleError::PermissionDenied(_))
    }
}

/// A single detection rule for one resource category.
///
/// `C` is the provider's per-target client context (SDK clients plus the
/// immutable thresholds the rule needs). Implementations must be read-only:
/// describe/list/get calls and nothing else.
pub trait Rule<C>: Send + Sync {
    /// Stable dotted identifier, e.g. `aws.ebs.unattached`.
    fn id(&self) -> &'static str;

    /// Evaluate the rule against one target, returning every finding it can
    /// justify with evidence.
    fn evaluate<'a>(
        &'a self,
        client: &'a C,
        target: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Finding>, RuleError>>;
}

/// A provider's complete rule set.
pub type Registry<C> = Vec<Box<dyn Rule<C>>>;
