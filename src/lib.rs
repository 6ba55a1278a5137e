//! Client for the Assembly file-processing service.
//!
//! Describe a pipeline with [`AssemblyDescription`], hand it to
//! [`AssemblyClient::create_assembly`], and await [`AssemblyRun::run`]. The run
//! submits a signed multipart request and polls the assembly until the service
//! reports it completed, canceled, or failed.

pub mod assembly;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod multipart;
pub mod signer;
pub mod status;
pub mod transport;

pub use assembly::{AssemblyCallbacks, AssemblyOutcome, AssemblyRun};
pub use client::AssemblyClient;
pub use config::ClientConfig;
pub use error::{AssemblyError, SignError, TransportError};
pub use models::{AssemblyDescription, AssemblyStatus, Credentials, Step};
pub use signer::SignatureAlgorithm;
pub use status::{classify, StatusKind};
pub use transport::{HttpResponse, HttpTransport, Transport};
