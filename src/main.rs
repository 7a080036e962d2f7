//! gestalt - Project tooling for Gestalt

use std::panic;
use std::process::ExitCode;

use gestalt_cli::error;

fn main() -> ExitCode {
    // panics are presented as bug reports below
    panic::set_hook(Box::new(|info| tracing::debug!(%info, "panicked")));

    let result = panic::catch_unwind(gestalt_cli::cli::run)
        .unwrap_or_else(|payload| Err(error::from_panic(payload.as_ref())));

    if let Err(e) = result {
        error::handle(&e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
