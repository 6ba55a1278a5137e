use std::sync::Arc;

use tracing::info;

use crate::assembly::{parse_status, AssemblyCallbacks, AssemblyRun};
use crate::config::{ClientConfig, ASSEMBLIES_PATH};
use crate::error::AssemblyError;
use crate::models::{AssemblyDescription, AssemblyStatus, Credentials};
use crate::transport::{HttpTransport, Transport};

/// Entry point for talking to the assembly service.
///
/// Cheap to clone; credentials and transport are shared between every run it creates.
#[derive(Clone)]
pub struct AssemblyClient {
    config: ClientConfig,
    credentials: Arc<Credentials>,
    transport: Arc<dyn Transport>,
}

impl AssemblyClient {
    pub fn new(credentials: Credentials, config: ClientConfig) -> Self {
        Self::with_transport(credentials, config, Arc::new(HttpTransport::new()))
    }

    pub fn with_transport(credentials: Credentials, config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self { config, credentials: Arc::new(credentials), transport }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn assemblies_url(&self) -> String {
        format!("{}/{}", self.config.endpoint.trim_end_matches('/'), ASSEMBLIES_PATH)
    }

    /// Prepares a run. No I/O happens until [`AssemblyRun::run`] is awaited.
    pub fn create_assembly(&self, description: AssemblyDescription, callbacks: AssemblyCallbacks) -> AssemblyRun {
        AssemblyRun::new(
            description,
            self.assemblies_url(),
            self.credentials.clone(),
            self.transport.clone(),
            self.config.clone(),
            callbacks,
        )
    }

    /// One status fetch. Service errors come back inside the status; use
    /// [`crate::status::classify`] to interpret it.
    pub async fn assembly_status(&self, assembly_url: &str) -> Result<AssemblyStatus, AssemblyError> {
        let response = self.transport.get(assembly_url).await?;
        parse_status(response)
    }

    /// Asks the service to cancel a running assembly.
    ///
    /// A run still polling that assembly will see `ASSEMBLY_CANCELED` on its next fetch.
    pub async fn cancel_assembly(&self, assembly_url: &str) -> Result<AssemblyStatus, AssemblyError> {
        info!(url = assembly_url, "canceling assembly");
        let response = self.transport.delete(assembly_url).await?;
        parse_status(response)
    }
}
