//! Provider connectivity core for lumen.
//!
//! This crate provides:
//! - Static registry of known model providers (local and cloud)
//! - Local runtime discovery (Ollama, LM Studio)
//! - Cloud catalog resolution and API key validation
//! - Credential management for API keys
//! - Per-model generation parameter storage
//! - Chat dispatch with a stable error taxonomy
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                   ModelGateway                       │
//! │  ┌──────────────┐ ┌──────────────┐ ┌─────────────┐  │
//! │  │ LocalScanner │ │ CloudCatalog │ │  Dispatch   │  │
//! │  │  (discovery) │ │  (listing)   │ │   Router    │  │
//! │  └──────────────┘ └──────────────┘ └─────────────┘  │
//! └─────────────────────────────────────────────────────┘
//!           │                 │                │
//!           ▼                 ▼                ▼
//! ┌─────────────────────────────────────────────────────┐
//! │   ProviderRegistry │ CredentialStore │ ConfigStore  │
//! │     (compiled-in)  │ (keyring + env) │ (JSON file)  │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! Every operation takes explicit provider and model identifiers; there is
//! no ambient "currently selected model" inside this crate.

mod error;
mod types;

pub mod auth;
pub mod cloud;
pub mod config;
pub mod discovery;
pub mod gateway;
pub mod registry;
pub mod router;

pub use error::{Error, Result};
pub use gateway::ModelGateway;
pub use types::{Attachment, ModelDescriptor, ModelId, ScanResult};
