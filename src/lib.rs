//! # vaultrun
//!
//! **KMS Auto-Unsealed Vault on a Managed Container Service**
//!
//! This crate composes the cloud resources for a single-instance Vault
//! server: a storage bucket for the backend, a KMS key ring and key for
//! auto-unseal, an IAM binding that lets the service identity use the key,
//! the container service itself, and an optional custom domain mapping.
//! The only published result is the URL the server is reachable on.
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                            vaultrun                                 │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────────┐    │
//! │  │                     vault::provision                        │    │
//! │  │  identity → storage, kms → server_config → service → domain │    │
//! │  └─────────────────────────────────────────────────────────────┘    │
//! │                              │ Output<T> handles                    │
//! │  ┌───────────────────────────┼───────────────────────────────┐      │
//! │  │                      Deployment                           │      │
//! │  │  one task per resource │ reconcile │ abort on failure     │      │
//! │  └───────────────────────────┼───────────────────────────────┘      │
//! │                              │ ResourceRequest                      │
//! ├──────────────────────────────┼──────────────────────────────────────┤
//! │                    ResourceProvider trait                           │
//! │  ┌──────────────────────────────────────────────┐                   │
//! │  │ LocalProvider (state.json, no credentials)   │                   │
//! │  └──────────────────────────────────────────────┘                   │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Resource Lifecycle
//!
//! Every resource goes through the same reconcile step on each run:
//!
//! ```text
//!   ┌─────────┐   create   ┌─────────┐  same request   ┌───────────┐
//!   │ (none)  │ ─────────► │ Created │ ──────────────► │ Unchanged │
//!   └─────────┘            └────┬────┘                 └───────────┘
//!                               │ changed request
//!                ┌──────────────┴──────────────┐
//!                ▼                             ▼
//!          ┌─────────┐                  ┌──────────┐
//!          │ Updated │ (in place)       │ Replaced │ (delete, then create)
//!          └─────────┘                  └──────────┘
//!
//!   no longer registered ──────────────► Deleted
//! ```
//!
//! # Invariants
//!
//! - **Ordering**: the IAM binding is requested only with the key's
//!   resolved id, and the service only after the binding succeeded.
//! - **Single writer**: scaling bounds are fixed at min 0 / max 1, and a
//!   renamed service is deleted before its successor is created.
//! - **No partial rollback**: the first fatal failure aborts the run and
//!   leaves created resources in place for the next run to adopt.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use vaultrun::{DeployConfig, LocalProvider};
//!
//! #[tokio::main]
//! async fn main() -> vaultrun::Result<()> {
//!     let config = DeployConfig::load()?;
//!     let provider = Arc::new(LocalProvider::open(config.state_dir().join("state.json"))?);
//!     let outputs = vaultrun::provision(&config, provider).await?;
//!     println!("{}", outputs.vault_url);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod constants;
pub mod engine;
pub mod error;
pub mod output;
pub mod providers;
pub mod resources;
pub mod vault;

// Re-exports
pub use config::{DeployConfig, LimitsConfig, default_state_dir};
pub use constants::*;
pub use engine::{Deployment, RunReport, Step, StepOutcome, destroy};
pub use error::{Error, Result};
pub use output::Output;
pub use providers::{LocalProvider, ProviderCall, ProviderOperation};
pub use resources::{ResourceId, ResourceKind, ResourceProvider, ResourceRecord};
pub use vault::{DomainBinding, KeyCoordinates, StackOutputs, VaultServerConfig, deploy, provision};
