//! LSP session: handshake, document lifecycle, and the formatting call.
//!
//! Holding an `LspSession` is proof the `initialize`/`initialized`
//! handshake succeeded — construction is initialization, there is no
//! separate Ready flag to check.

use anyhow::{Context, Result};
use serde_json::Value;

use crate::endpoint::{Handlers, RpcEndpoint};
use crate::protocol::{self, PublishDiagnosticsParams, TextEdit};
use crate::server::ServerProcess;

/// One live connection to the formatting server.
pub struct LspSession {
    endpoint: RpcEndpoint,
    server: Option<ServerProcess>,
}

/// Server-initiated traffic this client answers. Everything else is
/// silently ignored — a formatting-only client implements no optional
/// capabilities.
fn default_handlers() -> Handlers {
    Handlers::new()
        .on_request("client/registerCapability", |_| Value::Null)
        .on_notification("textDocument/publishDiagnostics", |params| {
            let parsed = params
                .map(serde_json::from_value::<PublishDiagnosticsParams>)
                .transpose();
            match parsed {
                Ok(Some(diagnostics)) => log_diagnostics(&diagnostics),
                Ok(None) => {}
                Err(e) => tracing::debug!("unparseable publishDiagnostics payload: {e}"),
            }
        })
}

fn log_diagnostics(params: &PublishDiagnosticsParams) {
    for diagnostic in &params.diagnostics {
        tracing::info!(
            uri = %params.uri,
            line = diagnostic.range.start.line + 1,
            "server diagnostic: {}",
            diagnostic.message
        );
    }
}

impl LspSession {
    /// Spawn the formatting server and run the handshake.
    /// `initialization_options` is the caller's opaque settings payload,
    /// forwarded verbatim to `initialize`.
    pub async fn spawn(initialization_options: &Value) -> Result<Self> {
        let (server, stdout, stdin) = ServerProcess::spawn().await?;
        let endpoint = RpcEndpoint::new(stdout, stdin, default_handlers());

        let session = Self {
            endpoint,
            server: Some(server),
        };
        // On handshake failure the session drops here and kill_on_drop
        // reaps the child.
        session.handshake(initialization_options).await?;
        Ok(session)
    }

    /// Run the handshake over an already-connected endpoint. Used by
    /// tests to drive the session over in-memory pipes.
    pub async fn connect(endpoint: RpcEndpoint, initialization_options: &Value) -> Result<Self> {
        let session = Self {
            endpoint,
            server: None,
        };
        session.handshake(initialization_options).await?;
        Ok(session)
    }

    /// Default handler set for wiring an endpoint externally (tests).
    #[must_use]
    pub fn handlers() -> Handlers {
        default_handlers()
    }

    async fn handshake(&self, initialization_options: &Value) -> Result<()> {
        self.endpoint
            .call(
                "initialize",
                Some(protocol::initialize_params(initialization_options)),
            )
            .await
            .context("LSP initialize failed")?;

        self.endpoint
            .notify("initialized", Some(serde_json::json!({})))
            .await
            .context("sending initialized notification")?;

        Ok(())
    }

    /// Open a document on the server: full text, XML language id,
    /// version 1. Each file is opened exactly once per run.
    pub async fn did_open(&self, uri: &str, text: &str) -> Result<()> {
        self.endpoint
            .notify(
                "textDocument/didOpen",
                Some(protocol::did_open_params(uri, text)),
            )
            .await
            .context("sending didOpen notification")?;
        Ok(())
    }

    /// Request formatting for an open document. A null or absent result
    /// means the server has no changes.
    pub async fn format(&self, uri: &str, options: &Value) -> Result<Vec<TextEdit>> {
        let result = self
            .endpoint
            .call(
                "textDocument/formatting",
                Some(protocol::formatting_params(uri, options)),
            )
            .await
            .context("textDocument/formatting failed")?;

        if result.is_null() {
            return Ok(Vec::new());
        }
        serde_json::from_value(result).context("malformed textDocument/formatting response")
    }

    /// Tear the session down, forcibly terminating the server.
    pub async fn close(mut self) {
        if let Some(mut server) = self.server.take() {
            server.kill().await;
        }
    }
}
