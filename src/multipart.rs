//! Builds the multipart submission: signed params first, then streams, then files.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::Path;

use chrono::{Duration, Utc};
use reqwest::multipart::{Form, Part};
use reqwest::Body;
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::error::{AssemblyError, TransportError};
use crate::models::{AssemblyParams, ByteStream, Credentials, FileInput, StreamInput};
use crate::signer::{SignatureAlgorithm, SignedEnvelope, Signer};

const OCTET_STREAM: &str = "application/octet-stream";

/// One binary part, read lazily when the request body is sent.
pub struct UploadPart {
    pub field: String,
    pub filename: String,
    pub mime_type: String,
    /// Known for files, unknown for streams.
    pub length: Option<u64>,
    pub reader: ByteStream,
}

impl std::fmt::Debug for UploadPart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadPart")
            .field("field", &self.field)
            .field("filename", &self.filename)
            .field("mime_type", &self.mime_type)
            .field("length", &self.length)
            .finish_non_exhaustive()
    }
}

/// A ready-to-send submission body.
#[derive(Debug, Default)]
pub struct MultipartPayload {
    pub text_fields: Vec<(String, String)>,
    pub parts: Vec<UploadPart>,
}

impl MultipartPayload {
    pub fn text(&self, name: &str) -> Option<&str> {
        self.text_fields.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
    }

    /// Converts into a streaming `reqwest` form; the form owns the boundary and `Content-Type`.
    pub fn into_form(self) -> Result<Form, TransportError> {
        let mut form = Form::new();
        for (name, value) in self.text_fields {
            form = form.text(name, value);
        }
        for part in self.parts {
            let body = Body::wrap_stream(ReaderStream::new(part.reader));
            let built = match part.length {
                Some(len) => Part::stream_with_length(body, len),
                None => Part::stream(body),
            };
            let built = built
                .file_name(part.filename)
                .mime_str(&part.mime_type)
                .map_err(|e| TransportError::InvalidPart { field: part.field.clone(), message: e.to_string() })?;
            form = form.part(part.field, built);
        }
        Ok(form)
    }
}

pub struct MultipartRequestBuilder<'a> {
    signer: Signer<'a>,
    sign: bool,
}

impl<'a> MultipartRequestBuilder<'a> {
    pub fn new(credentials: &'a Credentials, sign: bool, algorithm: SignatureAlgorithm, ttl: Duration) -> Self {
        Self { signer: Signer::new(credentials, algorithm, ttl), sign }
    }

    /// Serializes and (optionally) signs the params, then opens every file input.
    ///
    /// Missing files fail here, before anything is sent.
    pub async fn build(
        &self,
        mut params: AssemblyParams,
        files: BTreeMap<String, FileInput>,
        streams: BTreeMap<String, StreamInput>,
    ) -> Result<MultipartPayload, AssemblyError> {
        let SignedEnvelope { params, signature, .. } = self.signer.envelope(&mut params, self.sign, Utc::now())?;

        let mut payload = MultipartPayload::default();
        payload.text_fields.push(("params".to_string(), params));
        if let Some(signature) = signature {
            payload.text_fields.push(("signature".to_string(), signature));
        }

        for (field, stream) in streams {
            payload.parts.push(UploadPart {
                field,
                filename: stream.filename,
                mime_type: stream.mime_type,
                length: None,
                reader: stream.reader,
            });
        }

        for (field, input) in files {
            payload.parts.push(open_file_part(field, input).await?);
        }

        debug!(
            signed = self.sign,
            parts = payload.parts.len(),
            "built multipart submission"
        );
        Ok(payload)
    }
}

async fn open_file_part(field: String, input: FileInput) -> Result<UploadPart, AssemblyError> {
    let file = match tokio::fs::File::open(&input.path).await {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(AssemblyError::FileNotFound { field, path: input.path });
        }
        Err(source) => return Err(AssemblyError::Io { path: input.path, source }),
    };
    let length = file
        .metadata()
        .await
        .map_err(|source| AssemblyError::Io { path: input.path.clone(), source })?
        .len();

    let filename = input.filename.unwrap_or_else(|| basename(&input.path));
    let mime_type = mime_guess::from_path(&input.path)
        .first_raw()
        .unwrap_or(OCTET_STREAM)
        .to_string();

    Ok(UploadPart { field, filename, mime_type, length: Some(length), reader: Box::new(file) })
}

fn basename(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string())
}
