//! Per-file formatting orchestration: read, open, format, apply, write.

use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;

use crate::edits::apply_text_edits;
use crate::protocol;
use crate::session::LspSession;

/// Format one file in place through an established session.
///
/// Returns whether the file's content changed. Empty files are skipped
/// without touching the session — there is nothing to format, and that
/// counts as "no change", not an error.
pub async fn format_file(session: &LspSession, path: &Path, options: &Value) -> Result<bool> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    if text.is_empty() {
        tracing::debug!("skipping empty file {}", path.display());
        return Ok(false);
    }

    let absolute = std::path::absolute(path)
        .with_context(|| format!("resolving absolute path for {}", path.display()))?;
    let uri = protocol::path_to_file_uri(&absolute)?;

    session.did_open(uri.as_str(), &text).await?;
    let edits = session.format(uri.as_str(), options).await?;
    if edits.is_empty() {
        return Ok(false);
    }

    let formatted =
        apply_text_edits(&text, &edits).with_context(|| format!("applying {} edits", edits.len()))?;
    if formatted == text {
        return Ok(false);
    }

    // Plain overwrite, no atomic rename: a crash mid-write can truncate
    // the file. Accepted limitation for a pre-commit style tool.
    tokio::fs::write(path, &formatted)
        .await
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(true)
}
