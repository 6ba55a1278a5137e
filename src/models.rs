use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tokio::io::AsyncRead;

use crate::error::AssemblyError;

/// Robot used by [`AssemblyDescription::import_url`].
pub const HTTP_IMPORT_ROBOT: &str = "/http/import";

/// Forward-only, single-pass byte source for a stream input.
pub type ByteStream = Box<dyn AsyncRead + Send + Sync + Unpin>;

// ---- credentials ----

#[derive(Clone)]
pub struct Credentials {
    pub key: String,
    pub secret: String,
}

impl Credentials {
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self { key: key.into(), secret: secret.into() }
    }
}

// Keep the secret out of logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .finish()
    }
}

// ---- job description ----

/// One named unit of work. Parameters other than `robot` are passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub robot: String,
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl Step {
    pub fn new(robot: impl Into<String>) -> Self {
        Self { robot: robot.into(), params: Map::new() }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

/// An input backed by a file on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct FileInput {
    pub path: PathBuf,
    /// Overrides the basename of `path` as the uploaded filename.
    pub filename: Option<String>,
}

/// An input backed by a live byte stream.
pub struct StreamInput {
    pub filename: String,
    pub mime_type: String,
    pub reader: ByteStream,
}

impl fmt::Debug for StreamInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamInput")
            .field("filename", &self.filename)
            .field("mime_type", &self.mime_type)
            .finish_non_exhaustive()
    }
}

/// Everything needed to submit one assembly.
#[derive(Debug, Default)]
pub struct AssemblyDescription {
    pub template_id: Option<String>,
    pub notify_url: Option<String>,
    pub steps: BTreeMap<String, Step>,
    pub fields: Map<String, Value>,
    files: BTreeMap<String, FileInput>,
    streams: BTreeMap<String, StreamInput>,
}

impl AssemblyDescription {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_template(template_id: impl Into<String>) -> Self {
        Self { template_id: Some(template_id.into()), ..Self::default() }
    }

    pub fn add_step(&mut self, name: impl Into<String>, step: Step) -> &mut Self {
        self.steps.insert(name.into(), step);
        self
    }

    /// Adds a step that fetches `url` so the remote file becomes an input.
    pub fn import_url(&mut self, name: impl Into<String>, url: impl Into<String>) -> &mut Self {
        let url: String = url.into();
        self.add_step(name, Step::new(HTTP_IMPORT_ROBOT).param("url", url))
    }

    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Declares an on-disk input. The path is not checked until submission.
    pub fn add_file(
        &mut self,
        field: impl Into<String>,
        path: impl Into<PathBuf>,
        filename: Option<String>,
    ) -> Result<&mut Self, AssemblyError> {
        let field = self.claim_field(field.into())?;
        self.files.insert(field, FileInput { path: path.into(), filename });
        Ok(self)
    }

    pub fn add_stream(
        &mut self,
        field: impl Into<String>,
        filename: impl Into<String>,
        mime_type: impl Into<String>,
        reader: ByteStream,
    ) -> Result<&mut Self, AssemblyError> {
        let field = self.claim_field(field.into())?;
        self.streams.insert(
            field,
            StreamInput { filename: filename.into(), mime_type: mime_type.into(), reader },
        );
        Ok(self)
    }

    pub fn files(&self) -> &BTreeMap<String, FileInput> {
        &self.files
    }

    pub fn streams(&self) -> &BTreeMap<String, StreamInput> {
        &self.streams
    }

    /// Splits into the params object and the upload inputs.
    pub(crate) fn into_parts(self) -> (AssemblyParams, BTreeMap<String, FileInput>, BTreeMap<String, StreamInput>) {
        let params = AssemblyParams {
            auth: AuthParams::default(),
            steps: self.steps,
            fields: self.fields,
            template_id: self.template_id,
            notify_url: self.notify_url,
        };
        (params, self.files, self.streams)
    }

    fn claim_field(&self, field: String) -> Result<String, AssemblyError> {
        if self.files.contains_key(&field) || self.streams.contains_key(&field) {
            return Err(AssemblyError::DuplicateField(field));
        }
        Ok(field)
    }
}

// ---- wire params ----

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthParams {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<String>,
}

/// The JSON object sent (and signed) as the `params` form field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssemblyParams {
    pub auth: AuthParams,
    pub steps: BTreeMap<String, Step>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub fields: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notify_url: Option<String>,
}

// ---- wire response ----

/// Status payload returned by both submission and status fetches.
///
/// Only the fields the client inspects are typed; everything else is kept in `extra`.
/// Any JSON body deserializes: a typed field holding a number, bool, array or object
/// is kept as its JSON text, and a non-object body yields an empty status.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AssemblyStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ok: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assembly_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assembly_url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AssemblyStatus {
    /// The `error` field, treating an empty string as absent.
    pub fn error_code(&self) -> Option<&str> {
        self.error.as_deref().filter(|e| !e.is_empty())
    }
}

impl From<Value> for AssemblyStatus {
    fn from(body: Value) -> Self {
        let Value::Object(mut extra) = body else {
            return Self::default();
        };
        let mut take = |key: &str| extra.remove(key).and_then(text_of);
        let (ok, error, message) = (take("ok"), take("error"), take("message"));
        let (assembly_id, assembly_url) = (take("assembly_id"), take("assembly_url"));
        Self { ok, error, message, assembly_id, assembly_url, extra }
    }
}

impl<'de> Deserialize<'de> for AssemblyStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Self::from)
    }
}

fn text_of(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}
