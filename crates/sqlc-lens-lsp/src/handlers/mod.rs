//! LSP request handlers.
//!
//! Each handler turns a request into LSP types using the document text,
//! its parsed form and the query locator.

pub mod utils;

pub mod code_lens;
pub mod execute_command;
pub mod hover;
