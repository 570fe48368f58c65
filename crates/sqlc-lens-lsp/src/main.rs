//! sqlc-lens language server.
//!
//! Usage:
//!   sqlc-lens-lsp              # Start LSP server (stdio)
//!   sqlc-lens-lsp --version    # Print version
//!   sqlc-lens-lsp --help       # Print help

use std::process::ExitCode;

fn main() -> ExitCode {
    // Parse simple args (no clap needed for LSP server)
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("sqlc-lens-lsp {}", sqlc_lens_lsp::VERSION);
        return ExitCode::SUCCESS;
    }

    if args.iter().any(|a| a == "--help" || a == "-h") {
        println!("Language server for sqlc-generated TypeScript code");
        println!();
        println!("Usage: sqlc-lens-lsp [OPTIONS]");
        println!();
        println!("Options:");
        println!("  -h, --help     Print help");
        println!("  -V, --version  Print version");
        println!();
        println!("The server communicates via stdio using the Language Server Protocol.");
        println!();
        println!("Environment variables:");
        println!("  RUST_LOG       Set log level (e.g., RUST_LOG=sqlc_lens_lsp=debug,sqlc_lens_core=debug)");
        return ExitCode::SUCCESS;
    }

    // Logs go to stderr, stdout carries the protocol
    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "sqlc_lens_lsp=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match sqlc_lens_lsp::start_stdio() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Server error: {}", e);
            ExitCode::FAILURE
        }
    }
}
