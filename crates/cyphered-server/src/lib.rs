//! Static file serving over HTTP or HTTPS
//!
//! Serves a directory tree the way a plain file server does: files with
//! their content type, `index.html` for directories that have one, and a
//! generated listing for those that don't.

pub mod listing;
pub mod server;
pub mod tls;

pub use server::{router, FileServer, FileServerConfig, FileServerError, TlsFiles};
