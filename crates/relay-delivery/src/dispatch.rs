//! Concurrent fan-out of one payload to every selected workflow.
//!
//! # Flow
//!
//! ```text
//! workflows ──▶ select ──▶ working set ─┐
//! payload ────▶ sign ────▶ signature ───┼──▶ join_all(post per endpoint) ──▶ reduce
//!                                       │
//! transport ────────────────────────────┘
//! ```
//!
//! Deliveries run concurrently and the dispatch waits for all of them; a
//! failing endpoint never cancels its siblings. Outcomes come back in
//! working set order regardless of completion order.

use std::{collections::HashMap, sync::Arc};

use futures::future::join_all;
use relay_core::{Channel, Message, Payload};
use tracing::{debug, info, info_span, warn, Instrument};
use url::Url;
use uuid::Uuid;

use crate::{
    client::{ClientConfig, HttpTransport, Transport, TransportRequest},
    error::{DeliveryError, DispatchError, ErrorCategory, Result},
    outcome::{reduce, DeliveryOutcome, DispatchResult},
    retry::RetryPolicy,
    selector::select_endpoints,
    signing::{PayloadSigner, Signature, SignatureAlgorithm, SIGNATURE_HEADER},
};

/// Immutable settings for a dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchConfig {
    /// Candidate workflow URLs, in priority order.
    pub workflows: Vec<String>,
    /// Shared secret for `X-Signature`; `None` or empty disables signing.
    pub shared_secret: Option<String>,
    /// HMAC algorithm used when signing.
    pub signature_algorithm: SignatureAlgorithm,
    /// Channels whose messages this integration accepts.
    pub channels: Vec<Channel>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            workflows: Vec::new(),
            shared_secret: None,
            signature_algorithm: SignatureAlgorithm::default(),
            channels: vec![Channel::Server, Channel::Mobile, Channel::Client],
        }
    }
}

/// Fans payloads out to the configured workflows.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    config: Arc<DispatchConfig>,
    signer: Option<PayloadSigner>,
    transport: Arc<dyn Transport>,
}

impl Dispatcher {
    /// Creates a dispatcher over the given transport.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::ConfigurationError` if the shared secret
    /// cannot key the signer.
    pub fn new(config: DispatchConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        let signer =
            PayloadSigner::from_secret(config.shared_secret.as_deref(), config.signature_algorithm)
                .map_err(|e| DeliveryError::configuration(format!("shared secret: {e}")))?;

        Ok(Self { config: Arc::new(config), signer, transport })
    }

    /// Creates a dispatcher backed by [`HttpTransport`].
    pub fn with_http(
        config: DispatchConfig,
        client_config: ClientConfig,
        retry_policy: RetryPolicy,
    ) -> Result<Self> {
        let transport = HttpTransport::new(client_config, retry_policy)?;
        Self::new(config, Arc::new(transport))
    }

    /// Returns the dispatcher's configuration.
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Returns true if messages from `channel` should be dispatched.
    ///
    /// A message that names no channel is treated as server traffic.
    pub fn accepts(&self, channel: Option<Channel>) -> bool {
        self.config.channels.contains(&channel.unwrap_or_default())
    }

    /// Serializes `message` and dispatches it.
    ///
    /// Every event kind takes this same path.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::Serialization` if the message cannot be
    /// encoded, or `DispatchError::AllFailed` if every delivery failed.
    pub async fn dispatch(&self, message: &Message) -> DispatchResult {
        let payload = message.to_payload().map_err(DispatchError::from)?;

        self.dispatch_payload(&payload)
            .instrument(info_span!("event", kind = %message.kind, channel = %message.source_channel()))
            .await
    }

    /// Delivers an already serialized payload to every selected workflow.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::AllFailed` if at least one delivery was
    /// attempted and all of them failed.
    pub async fn dispatch_payload(&self, payload: &Payload) -> DispatchResult {
        let dispatch_id = Uuid::new_v4();
        let endpoints = select_endpoints(&self.config.workflows);
        let signature = self.signer.as_ref().map(|signer| signer.sign(payload.as_bytes()));

        let span = info_span!(
            "workflow_dispatch",
            %dispatch_id,
            endpoints = endpoints.len(),
            payload_bytes = payload.len(),
            signed = signature.is_some(),
        );

        async move {
            if endpoints.is_empty() {
                debug!("no valid workflow endpoints configured");
                return reduce(dispatch_id, Vec::new());
            }

            let shared_signature = signature.as_ref();
            let deliveries = endpoints.into_iter().enumerate().map(move |(index, endpoint)| {
                self.deliver(index, endpoint, payload, shared_signature)
            });
            let outcomes = join_all(deliveries).await;

            let result = reduce(dispatch_id, outcomes);
            match &result {
                Ok(report) => info!(
                    succeeded = report.succeeded().count(),
                    failed = report.failed().count(),
                    "workflow dispatch completed"
                ),
                Err(error) => warn!(%error, "workflow dispatch failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    /// Delivers to one endpoint, capturing the result instead of raising it.
    async fn deliver(
        &self,
        index: usize,
        endpoint: Url,
        payload: &Payload,
        signature: Option<&Signature>,
    ) -> DeliveryOutcome {
        let span = info_span!("workflow_delivery", index, url = %endpoint);

        async move {
            let mut headers = HashMap::new();
            if let Some(signature) = signature {
                headers.insert(SIGNATURE_HEADER.to_string(), signature.to_string());
            }

            let request = TransportRequest {
                url: endpoint.clone(),
                headers,
                body: payload.body(),
                content_type: payload.content_type().to_string(),
            };

            let result = self.transport.post(request).await;
            match &result {
                Ok(response) => debug!(
                    status = response.status_code,
                    attempts = response.attempts,
                    duration_ms = response.duration.as_millis(),
                    "workflow accepted delivery"
                ),
                Err(error) => warn!(
                    %error,
                    category = %ErrorCategory::from(error),
                    retryable = error.is_retryable(),
                    "workflow delivery failed"
                ),
            }

            DeliveryOutcome { index, endpoint, result }
        }
        .instrument(span)
        .await
    }
}
