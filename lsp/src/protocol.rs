//! JSON-RPC envelopes and the LSP payload types this client exchanges.
//!
//! Payloads coming back from the server are deserialized into the typed
//! structs here at the protocol boundary; opaque configuration blobs
//! (initializationOptions, formatting options) stay `serde_json::Value`
//! and are forwarded verbatim.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// The LSP language identifier sent with every `didOpen`.
pub const LANGUAGE_ID_XML: &str = "xml";

#[derive(Debug, thiserror::Error)]
#[error("cannot express path as a file:// URI: {}", path.display())]
pub struct PathToUriError {
    path: PathBuf,
}

/// Outgoing request envelope.
#[derive(Debug, Serialize)]
pub(crate) struct Request {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl Request {
    pub fn new(id: u64, method: &'static str, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

/// Outgoing notification envelope (no id, no reply).
#[derive(Debug, Serialize)]
pub(crate) struct Notification {
    pub jsonrpc: &'static str,
    pub method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl Notification {
    pub fn new(method: &'static str, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            method,
            params,
        }
    }
}

/// A line/character coordinate in a document.
///
/// LSP counts `character` in UTF-16 code units. This client passes the
/// value through as a raw offset from the line start (see `edits` for
/// the documented policy).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

/// A contiguous span between two positions, start ≤ end in document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

/// One replacement returned by `textDocument/formatting`: the content at
/// `range` becomes `new_text`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextEdit {
    pub range: Range,
    #[serde(rename = "newText", default)]
    pub new_text: String,
}

/// Payload of `textDocument/publishDiagnostics` (only the fields we log).
#[derive(Debug, Deserialize)]
pub(crate) struct PublishDiagnosticsParams {
    pub uri: String,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Diagnostic {
    pub range: Range,
    pub message: String,
}

/// Parameters for the `initialize` request. The client advertises no
/// capabilities; `initialization_options` is the caller's opaque settings
/// document, forwarded untouched.
pub(crate) fn initialize_params(initialization_options: &serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "processId": std::process::id(),
        "rootPath": null,
        "rootUri": "file:///",
        "initializationOptions": initialization_options,
        "capabilities": {},
        "trace": "off",
        "workspaceFolders": null
    })
}

pub(crate) fn did_open_params(uri: &str, text: &str) -> serde_json::Value {
    serde_json::json!({
        "textDocument": {
            "uri": uri,
            "languageId": LANGUAGE_ID_XML,
            "version": 1,
            "text": text
        }
    })
}

pub(crate) fn formatting_params(uri: &str, options: &serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "textDocument": { "uri": uri },
        "options": options
    })
}

/// Absolute filesystem path → `file://` URI.
pub fn path_to_file_uri(path: &Path) -> Result<url::Url, PathToUriError> {
    url::Url::from_file_path(path).map_err(|()| PathToUriError {
        path: path.to_path_buf(),
    })
}
