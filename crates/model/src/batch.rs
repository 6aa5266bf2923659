//! Return-value shapes for `replicate`/`replicateBatch` (spec.md §4.1).
//! The return value is "the sole contract" (spec.md §9) — emitted events
//! are informational only — so these types are what every test in
//! spec.md §8's end-to-end scenarios asserts against.

use serde::Serialize;

/// Outcome of writing to a single resolved destination within one
/// `replicate` call.
#[derive(Debug, Clone, Serialize)]
pub struct RouteOutcome {
    pub target: String,
    pub success: bool,
    pub error: Option<String>,
}

impl RouteOutcome {
    pub fn ok(target: impl Into<String>) -> Self {
        RouteOutcome {
            target: target.into(),
            success: true,
            error: None,
        }
    }

    pub fn failed(target: impl Into<String>, error: impl Into<String>) -> Self {
        RouteOutcome {
            target: target.into(),
            success: false,
            error: Some(error.into()),
        }
    }
}

/// The result of a single `replicate(...)` call.
#[derive(Debug, Clone, Serialize)]
pub struct ReplicateResult {
    pub success: bool,
    pub skipped: bool,
    pub skip_reason: Option<String>,
    pub results: Vec<RouteOutcome>,
    pub errors: Vec<String>,
    pub tables: Vec<String>,
}

impl ReplicateResult {
    pub fn skipped(reason: impl Into<String>) -> Self {
        ReplicateResult {
            success: true,
            skipped: true,
            skip_reason: Some(reason.into()),
            results: Vec::new(),
            errors: Vec::new(),
            tables: Vec::new(),
        }
    }

    /// Builds the result from per-route outcomes. Overall `success` is
    /// `true` only when every route succeeded — but a route failure never
    /// prevents the remaining routes from being attempted (spec.md §4.1).
    pub fn from_route_outcomes(results: Vec<RouteOutcome>) -> Self {
        let errors: Vec<String> = results
            .iter()
            .filter_map(|r| r.error.clone())
            .collect();
        let tables = results.iter().map(|r| r.target.clone()).collect();
        let success = errors.is_empty();
        ReplicateResult {
            success,
            skipped: false,
            skip_reason: None,
            results,
            errors,
            tables,
        }
    }
}

/// The result of a `replicateBatch(...)` call.
#[derive(Debug, Clone, Serialize)]
pub struct ReplicateBatchResult {
    pub success: bool,
    pub total: usize,
    pub successful: usize,
    pub results: Vec<ReplicateResult>,
    pub errors: Vec<String>,
}

impl ReplicateBatchResult {
    pub fn from_results(results: Vec<ReplicateResult>) -> Self {
        let total = results.len();
        let successful = results.iter().filter(|r| r.success).count();
        let errors: Vec<String> = results.iter().flat_map(|r| r.errors.clone()).collect();
        ReplicateBatchResult {
            success: successful == total,
            total,
            successful,
            results,
            errors,
        }
    }

    pub fn empty() -> Self {
        ReplicateBatchResult {
            success: true,
            total: 0,
            successful: 0,
            results: Vec::new(),
            errors: Vec::new(),
        }
    }
}
