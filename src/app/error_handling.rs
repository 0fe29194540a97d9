//! Fatal error reporting

use tracing::error;

/// Print `error` and exit with a status derived from it
///
/// Crate errors map to their own exit codes and, when verbose, show the
/// error code and the engine-side workflow to inspect. Anything else exits 1.
pub fn handle_fatal_error(error: anyhow::Error, verbose: u8) -> ! {
    use crate::error::{describe_error_code, RunnerError};

    error!("Fatal error: {}", error);

    let exit_code = if let Some(runner_err) = error.downcast_ref::<RunnerError>() {
        eprintln!("Error: {}", runner_err);
        if let Some(name) = runner_err.workflow_name() {
            eprintln!("Inspect the workflow with: argo get {}", name);
        }
        if verbose >= 1 {
            eprintln!("\n{}", describe_error_code(runner_err.code()));
            let mut source = std::error::Error::source(runner_err);
            while let Some(cause) = source {
                eprintln!("  caused by: {}", cause);
                source = cause.source();
            }
        }
        runner_err.exit_code()
    } else {
        eprintln!("Error: {error}");
        if verbose >= 1 {
            eprintln!("\nError chain:");
            for (i, cause) in error.chain().enumerate() {
                eprintln!("  {}: {}", i, cause);
            }
        }
        1
    };

    std::process::exit(exit_code)
}
