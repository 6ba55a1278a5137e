//! Lifecycle of one assembly: submit, classify, poll until terminal.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::AssemblyError;
use crate::models::{AssemblyDescription, AssemblyStatus, Credentials};
use crate::multipart::MultipartRequestBuilder;
use crate::status::{classify, StatusKind};
use crate::transport::{HttpResponse, Transport};

pub type StatusCallback = Arc<dyn Fn(&AssemblyStatus) + Send + Sync>;
pub type ErrorCallback = Arc<dyn Fn(&AssemblyError, Option<&AssemblyStatus>) + Send + Sync>;

/// Hooks fired as a run moves between states. All default to no-ops.
///
/// Order per run: any number of `on_update`, then one of `on_success`/`on_error`,
/// then `on_complete` when the service reported a terminal status.
#[derive(Clone)]
pub struct AssemblyCallbacks {
    on_update: StatusCallback,
    on_success: StatusCallback,
    on_error: ErrorCallback,
    on_complete: StatusCallback,
}

impl Default for AssemblyCallbacks {
    fn default() -> Self {
        Self {
            on_update: Arc::new(|_| {}),
            on_success: Arc::new(|_| {}),
            on_error: Arc::new(|_, _| {}),
            on_complete: Arc::new(|_| {}),
        }
    }
}

impl fmt::Debug for AssemblyCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssemblyCallbacks").finish_non_exhaustive()
    }
}

impl AssemblyCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_update(mut self, f: impl Fn(&AssemblyStatus) + Send + Sync + 'static) -> Self {
        self.on_update = Arc::new(f);
        self
    }

    pub fn on_success(mut self, f: impl Fn(&AssemblyStatus) + Send + Sync + 'static) -> Self {
        self.on_success = Arc::new(f);
        self
    }

    pub fn on_error(mut self, f: impl Fn(&AssemblyError, Option<&AssemblyStatus>) + Send + Sync + 'static) -> Self {
        self.on_error = Arc::new(f);
        self
    }

    pub fn on_complete(mut self, f: impl Fn(&AssemblyStatus) + Send + Sync + 'static) -> Self {
        self.on_complete = Arc::new(f);
        self
    }
}

/// How a run ended when it did not end in error.
#[derive(Debug, Clone, PartialEq)]
pub enum AssemblyOutcome {
    /// `ASSEMBLY_COMPLETED`.
    Completed(AssemblyStatus),
    /// Canceled or aborted on the service side.
    Stopped(AssemblyStatus),
}

impl AssemblyOutcome {
    pub fn status(&self) -> &AssemblyStatus {
        match self {
            Self::Completed(s) | Self::Stopped(s) => s,
        }
    }

    pub fn into_status(self) -> AssemblyStatus {
        match self {
            Self::Completed(s) | Self::Stopped(s) => s,
        }
    }
}

/// Owns one assembly from submission to its terminal state.
///
/// Nothing happens until [`AssemblyRun::run`] is awaited. Dropping that future
/// abandons the run without firing further callbacks.
pub struct AssemblyRun {
    description: Option<AssemblyDescription>,
    submit_url: String,
    credentials: Arc<Credentials>,
    transport: Arc<dyn Transport>,
    config: ClientConfig,
    callbacks: AssemblyCallbacks,
    last_response: Option<AssemblyStatus>,
    refresh_count: u32,
}

impl AssemblyRun {
    pub fn new(
        description: AssemblyDescription,
        submit_url: String,
        credentials: Arc<Credentials>,
        transport: Arc<dyn Transport>,
        config: ClientConfig,
        callbacks: AssemblyCallbacks,
    ) -> Self {
        Self {
            description: Some(description),
            submit_url,
            credentials,
            transport,
            config,
            callbacks,
            last_response: None,
            refresh_count: 0,
        }
    }

    /// Status fetch attempts made so far, including one that hit the budget.
    pub fn refresh_count(&self) -> u32 {
        self.refresh_count
    }

    pub fn last_response(&self) -> Option<&AssemblyStatus> {
        self.last_response.as_ref()
    }

    /// Submits the assembly and polls until the service reports a terminal state.
    ///
    /// Every failure is also reported through `on_error` before it is returned.
    /// `on_complete` fires only when the service reported a terminal status; local
    /// failures (transport, unparsable body, missing file, exhausted polling budget,
    /// missing assembly URL) fire `on_error` alone. Can only be called once.
    pub async fn run(&mut self) -> Result<AssemblyOutcome, AssemblyError> {
        let description = self.description.take().ok_or(AssemblyError::AlreadyStarted)?;

        let mut status = match self.submit(description).await {
            Ok(status) => status,
            Err(err) => return Err(self.fail(err)),
        };

        loop {
            self.last_response = Some(status.clone());
            match classify(&status) {
                StatusKind::Error => {
                    let err = AssemblyError::Service {
                        code: status.error_code().unwrap_or_default().to_string(),
                        message: status.message.clone(),
                    };
                    warn!(assembly_id = ?status.assembly_id, code = err.code(), "assembly failed");
                    (self.callbacks.on_error)(&err, Some(&status));
                    (self.callbacks.on_complete)(&status);
                    return Err(err);
                }
                StatusKind::Success => {
                    info!(assembly_id = ?status.assembly_id, refresh_count = self.refresh_count, "assembly completed");
                    (self.callbacks.on_success)(&status);
                    (self.callbacks.on_complete)(&status);
                    return Ok(AssemblyOutcome::Completed(status));
                }
                StatusKind::TerminalNonError => {
                    info!(assembly_id = ?status.assembly_id, ok = ?status.ok, "assembly stopped");
                    (self.callbacks.on_update)(&status);
                    (self.callbacks.on_complete)(&status);
                    return Ok(AssemblyOutcome::Stopped(status));
                }
                StatusKind::NonTerminal => {
                    debug!(assembly_id = ?status.assembly_id, ok = ?status.ok, "assembly in progress");
                    (self.callbacks.on_update)(&status);
                }
            }

            status = match self.refresh().await {
                Ok(status) => status,
                Err(err) => return Err(self.fail(err)),
            };
        }
    }

    async fn submit(&mut self, description: AssemblyDescription) -> Result<AssemblyStatus, AssemblyError> {
        let (params, files, streams) = description.into_parts();
        let payload = MultipartRequestBuilder::new(
            &self.credentials,
            self.config.sign,
            self.config.algorithm,
            self.config.signature_ttl,
        )
        .build(params, files, streams)
        .await?;

        info!(url = %self.submit_url, "submitting assembly");
        let response = self.transport.post_multipart(&self.submit_url, payload).await?;
        parse_status(response)
    }

    async fn refresh(&mut self) -> Result<AssemblyStatus, AssemblyError> {
        self.refresh_count += 1;
        if self.refresh_count > self.config.max_refresh {
            return Err(AssemblyError::MaxRefresh { max_refresh: self.config.max_refresh });
        }
        let url = self
            .last_response
            .as_ref()
            .and_then(|s| s.assembly_url.clone())
            .ok_or(AssemblyError::NoAssemblyUrl)?;

        debug!(%url, refresh_count = self.refresh_count, delay = ?self.config.refresh_delay, "scheduling status fetch");
        tokio::time::sleep(self.config.refresh_delay).await;
        let response = self.transport.get(&url).await?;
        parse_status(response)
    }

    fn fail(&self, err: AssemblyError) -> AssemblyError {
        warn!(code = err.code(), error = %err, "assembly run aborted");
        (self.callbacks.on_error)(&err, self.last_response.as_ref());
        err
    }
}

/// The body is authoritative regardless of the HTTP status code.
pub(crate) fn parse_status(response: HttpResponse) -> Result<AssemblyStatus, AssemblyError> {
    serde_json::from_str(&response.body).map_err(|source| AssemblyError::InvalidResponse {
        status: response.status,
        source,
    })
}
