//! Classification of assembly status payloads.

use crate::models::AssemblyStatus;

pub const ASSEMBLY_COMPLETED: &str = "ASSEMBLY_COMPLETED";
pub const ASSEMBLY_CANCELED: &str = "ASSEMBLY_CANCELED";
pub const REQUEST_ABORTED: &str = "REQUEST_ABORTED";

/// What a status payload means for the run that received it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    /// The service reported an error.
    Error,
    /// The assembly finished successfully.
    Success,
    /// The assembly was canceled or its request aborted.
    TerminalNonError,
    /// Still uploading or executing; poll again.
    NonTerminal,
}

impl StatusKind {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::NonTerminal)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Classified {
    pub kind: StatusKind,
    pub payload: AssemblyStatus,
}

impl From<AssemblyStatus> for Classified {
    fn from(payload: AssemblyStatus) -> Self {
        Self { kind: classify(&payload), payload }
    }
}

/// An `error` field wins over any `ok` value.
pub fn classify(status: &AssemblyStatus) -> StatusKind {
    if status.error_code().is_some() {
        return StatusKind::Error;
    }
    match status.ok.as_deref() {
        Some(ASSEMBLY_COMPLETED) => StatusKind::Success,
        Some(ASSEMBLY_CANCELED) | Some(REQUEST_ABORTED) => StatusKind::TerminalNonError,
        _ => StatusKind::NonTerminal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn status(body: serde_json::Value) -> AssemblyStatus {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_completed_is_success() {
        assert_eq!(classify(&status(json!({"ok": "ASSEMBLY_COMPLETED"}))), StatusKind::Success);
    }

    #[test]
    fn test_error_takes_precedence_over_ok() {
        let body = status(json!({"ok": "ASSEMBLY_COMPLETED", "error": "INTERNAL_COMMAND_ERROR"}));
        assert_eq!(classify(&body), StatusKind::Error);
    }

    #[test]
    fn test_cancel_and_abort_are_terminal_non_error() {
        for ok in [ASSEMBLY_CANCELED, REQUEST_ABORTED] {
            let kind = classify(&status(json!({ "ok": ok })));
            assert_eq!(kind, StatusKind::TerminalNonError);
            assert!(kind.is_terminal());
        }
    }

    #[test]
    fn test_in_progress_codes_are_non_terminal() {
        for ok in ["ASSEMBLY_UPLOADING", "ASSEMBLY_EXECUTING", "ASSEMBLY_REPLAYING", "SOMETHING_NEW"] {
            let kind = classify(&status(json!({ "ok": ok, "assembly_url": "http://x" })));
            assert_eq!(kind, StatusKind::NonTerminal, "{ok}");
            assert!(!kind.is_terminal());
        }
    }

    #[test]
    fn test_body_without_ok_or_error_is_non_terminal() {
        assert_eq!(classify(&status(json!({}))), StatusKind::NonTerminal);
    }

    #[test]
    fn test_empty_error_string_is_ignored() {
        assert_eq!(classify(&status(json!({"ok": "ASSEMBLY_COMPLETED", "error": ""}))), StatusKind::Success);
    }

    #[test]
    fn test_classified_keeps_payload() {
        let body = status(json!({"error": "FILE_FILTER_DECLINED_FILE", "message": "too big"}));
        let classified = Classified::from(body.clone());
        assert_eq!(classified.kind, StatusKind::Error);
        assert_eq!(classified.payload, body);
    }
}
