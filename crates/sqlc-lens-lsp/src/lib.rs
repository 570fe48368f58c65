//! Language server for sqlc-generated TypeScript projects.
//!
//! Links generated data-access code back to the SQL that produced it:
//! - Hover over a query function to preview its SQL
//! - Code lenses above query functions and their call sites
//! - A command that jumps to the `-- name:` marker of a query
//!
//! # Architecture
//!
//! - **Main loop**: Handles LSP messages one at a time, keeps the VFS and
//!   settings current, answers requests
//! - **VFS**: Open documents with their cached parse results
//! - **Handlers**: Turn [`sqlc_lens_core::QueryLocator`] results into LSP types
//!
//! # Example
//!
//! ```ignore
//! fn main() {
//!     sqlc_lens_lsp::start_stdio().expect("server failed");
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod handlers;
pub mod main_loop;

mod server;
mod vfs;

pub use main_loop::run_main_loop;
pub use server::{server_capabilities, start_stdio, Server};
pub use vfs::{Document, Vfs};

/// LSP server version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
