//! Concurrent fan-out delivery of events to workflow endpoints.
//!
//! One event payload goes out to up to ten configured workflow URLs at once,
//! each request optionally signed with an HMAC of the body. The per-endpoint
//! results are folded into a single verdict: the dispatch fails only when
//! every attempted delivery failed.
//!
//! # Architecture
//!
//! 1. **Select** - filter configured URLs and cap the working set
//! 2. **Sign** - compute one `X-Signature` digest for the payload
//! 3. **Fan out** - POST to every endpoint concurrently and wait for all
//! 4. **Reduce** - apply the "not all failed" policy
//!
//! Timeouts and retries live in the [`client::Transport`]; the fan-out itself
//! never retries and keeps no state between calls.
//!
//! # Example
//!
//! ```no_run
//! use relay_core::{EventKind, Message};
//! use relay_delivery::{
//!     client::ClientConfig, retry::RetryPolicy, DispatchConfig, Dispatcher, DispatchError,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = DispatchConfig {
//!     workflows: vec!["https://workflow.example.com/hook".to_string()],
//!     shared_secret: Some("teehee".to_string()),
//!     ..Default::default()
//! };
//! let dispatcher =
//!     Dispatcher::with_http(config, ClientConfig::default(), RetryPolicy::default())?;
//!
//! let message = Message::new(EventKind::Track).with_field("event", "Signed Up");
//! match dispatcher.dispatch(&message).await {
//!     Ok(report) => println!("delivered to {} workflows", report.succeeded().count()),
//!     Err(DispatchError::AllFailed { failures, .. }) => {
//!         eprintln!("{} workflows failed", failures.len())
//!     },
//!     Err(e) => return Err(e.into()),
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod dispatch;
pub mod error;
pub mod outcome;
pub mod retry;
pub mod selector;
pub mod signing;

pub use dispatch::{DispatchConfig, Dispatcher};
pub use error::{DeliveryError, DispatchError, ErrorCategory, Result};
pub use outcome::{DeliveryOutcome, DispatchReport, DispatchResult};

/// Default per-attempt HTTP timeout in seconds.
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 5;

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 5;
