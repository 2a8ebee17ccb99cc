//! Confidant - Confidentiality-Preserving Remote Email Classification
//!
//! Confidant lets an application get a categorical judgment on an email
//! from a third-party language model without the email, or the verdict,
//! ever landing in durable logs, and without the model credential ever
//! entering the application's environment.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                     Calling application                           │
//! │  ┌────────────────────────────────────────────────────────────┐  │
//! │  │                  Invocation Client                          │  │
//! │  │  - Seal content under a fresh single-use key                │  │
//! │  │  - Invoke over the authenticated channel                    │  │
//! │  │  - Open the sealed verdict                                  │  │
//! │  └──────────────┬─────────────────────────────┬───────────────┘  │
//! │                 │ transient / channel failure │                  │
//! │                 │                ┌────────────▼───────────────┐  │
//! │                 │                │ Fallback Path              │  │
//! │                 │                │ - caller's own credential  │  │
//! │                 │                └────────────────────────────┘  │
//! └─────────────────┼────────────────────────────────────────────────┘
//!                   │ POST /invoke (bearer token, sealed payload)
//! ┌─────────────────▼────────────────────────────────────────────────┐
//! │                Remote Classifier (logging-restricted)             │
//! │  ┌────────────────────┐  ┌─────────────────────────────────────┐ │
//! │  │  Secret Cache      │  │  Received → Decrypted → ModelCalled │ │
//! │  │  - fetch once      │  │  → ResultSealed → Completed         │ │
//! │  │  - per instance    │  │  metadata-only log events           │ │
//! │  └────────────────────┘  └─────────────────────────────────────┘ │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`crypto`]: Encryption envelope and content key transport
//! - [`secrets`]: Secret stores and the per-instance credential cache
//! - [`model`]: Model provider capability and closed label set
//! - [`remote`]: Remote classifier and its HTTP surface
//! - [`client`]: Invocation client and fallback path
//! - [`audit`]: Metadata-only log events and sinks
//! - [`config`]: Configuration management

pub mod audit;
pub mod client;
pub mod config;
pub mod crypto;
pub mod error;
pub mod hardening;
pub mod model;
pub mod protocol;
pub mod remote;
pub mod secrets;

#[cfg(test)]
mod test_support;

pub use client::{Classification, ClassificationPath, InvocationClient, InvocationClientBuilder};
pub use config::ConfidantConfig;
pub use error::{Error, FailureKind, Result};
pub use protocol::ClassificationResult;
pub use remote::{RemoteClassifier, RemoteClassifierBuilder};
