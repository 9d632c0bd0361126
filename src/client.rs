//! Cache-aware fetch client.
//!
//! Developer-friendly goal: keep the public surface small and predictable.
//! Implementation details are split into submodules under `src/client/`.

pub mod builder;
pub mod config;
pub mod core;
pub mod envelope;
pub mod error_classification;
mod extras;
pub mod options;
pub mod policy;
pub mod session;

pub use builder::FetchClientBuilder;
pub use config::ClientConfig;
pub use core::FetchClient;
pub use envelope::ResponseEnvelope;
pub use error_classification::{classify_status, Outcome};
pub use options::RequestOptions;
pub use policy::{Decision, RetryPolicy};
pub use session::{RequestSession, SessionSnapshot};
