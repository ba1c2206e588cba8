//! LSP client that drives the lemminx XML formatting server over stdio
//! and applies the returned text edits to files in place.

pub mod codec;
pub mod edits;
pub mod endpoint;
pub mod protocol;
pub mod settings;

pub(crate) mod server;

mod format;
mod session;

pub use edits::{EditError, LineIndex, apply_text_edits};
pub use endpoint::{Handlers, RpcEndpoint, RpcError};
pub use format::format_file;
pub use protocol::{Position, Range, TextEdit};
pub use session::LspSession;
pub use settings::Settings;
