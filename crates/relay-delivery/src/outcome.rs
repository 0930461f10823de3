//! Per-endpoint outcomes and the aggregate dispatch verdict.
//!
//! A dispatch fails only when every attempted delivery failed. Each workflow
//! is an independent consumer, so one endpoint being down must not fail the
//! event for the others. A dispatch that attempted nothing succeeds.

use url::Url;
use uuid::Uuid;

use crate::{
    client::DeliveryResponse,
    error::{DeliveryError, DispatchError},
};

/// Aggregate result of one dispatch call.
pub type DispatchResult = std::result::Result<DispatchReport, DispatchError>;

/// Result of delivering to one endpoint.
#[derive(Debug, Clone)]
pub struct DeliveryOutcome {
    /// Position of the endpoint in the working set.
    pub index: usize,
    /// Endpoint the payload was posted to.
    pub endpoint: Url,
    /// Transport verdict for this endpoint.
    pub result: Result<DeliveryResponse, DeliveryError>,
}

impl DeliveryOutcome {
    /// Returns true if the endpoint accepted the delivery.
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// Returns the failure, if any.
    pub fn error(&self) -> Option<&DeliveryError> {
        self.result.as_ref().err()
    }

    /// Returns the HTTP status the endpoint answered with, if it answered.
    pub fn status_code(&self) -> Option<u16> {
        match &self.result {
            Ok(response) => Some(response.status_code),
            Err(error) => error.status_code(),
        }
    }
}

/// Successful dispatch: every outcome, including partial failures.
#[derive(Debug, Clone)]
pub struct DispatchReport {
    /// Identifier used to correlate logs for this dispatch.
    pub dispatch_id: Uuid,
    outcomes: Vec<DeliveryOutcome>,
}

impl DispatchReport {
    /// All outcomes in working set order.
    pub fn outcomes(&self) -> &[DeliveryOutcome] {
        &self.outcomes
    }

    /// Outcomes that succeeded.
    pub fn succeeded(&self) -> impl Iterator<Item = &DeliveryOutcome> {
        self.outcomes.iter().filter(|outcome| outcome.is_success())
    }

    /// Outcomes that failed.
    pub fn failed(&self) -> impl Iterator<Item = &DeliveryOutcome> {
        self.outcomes.iter().filter(|outcome| !outcome.is_success())
    }

    /// True if some, but not all, deliveries failed.
    pub fn is_partial(&self) -> bool {
        self.failed().next().is_some()
    }

    /// Number of deliveries attempted.
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// True if no delivery was attempted.
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

/// Applies the "fail only if all failed" policy.
///
/// `outcomes` must be in working set order; that order is kept in both the
/// report and the failure list.
pub fn reduce(dispatch_id: Uuid, outcomes: Vec<DeliveryOutcome>) -> DispatchResult {
    let attempted = outcomes.len();
    let failures = outcomes.iter().filter(|outcome| !outcome.is_success()).count();

    if attempted > 0 && failures == attempted {
        return Err(DispatchError::AllFailed { dispatch_id, failures: outcomes });
    }

    Ok(DispatchReport { dispatch_id, outcomes })
}
