//! Calculator executable management.
//!
//! Makes sure the `holdem-eval` binary exists before the bot starts,
//! building it from its Makefile when it is missing.

use std::path::Path;
use tokio::process::Command;
use tracing::{debug, error, info};

use crate::types::BotError;

/// Ensure the calculator executable exists at `executable`.
///
/// When it is missing and `build_dir` holds a Makefile, runs `make -C
/// build_dir` (plus `make clean-dependencies` if requested) and checks
/// again. Dependencies are never cleaned when the executable was already
/// present.
pub async fn ensure_executable(
    executable: &Path,
    build_dir: Option<&Path>,
    clean_dependencies: bool,
) -> Result<(), BotError> {
    if executable.exists() {
        debug!(path = %executable.display(), "Calculator executable found");
        return Ok(());
    }

    let Some(dir) = build_dir else {
        error!(path = %executable.display(), "Calculator executable not found and no build directory configured");
        return Err(BotError::Calculator(format!(
            "executable not found: {}",
            executable.display()
        )));
    };

    if !dir.join("Makefile").exists() {
        error!(dir = %dir.display(), "Neither calculator executable nor Makefile found");
        return Err(BotError::Calculator(format!(
            "Makefile not found in {}",
            dir.display()
        )));
    }

    debug!(dir = %dir.display(), "Makefile found, building calculator");
    run_make(dir, &[]).await?;
    info!(dir = %dir.display(), "Calculator built successfully");

    if clean_dependencies {
        run_make(dir, &["clean-dependencies"]).await?;
        info!("Calculator build dependencies cleaned");
    }

    if !executable.exists() {
        error!(path = %executable.display(), "Build finished but executable is still missing");
        return Err(BotError::Calculator(format!(
            "build did not produce {}",
            executable.display()
        )));
    }

    Ok(())
}

async fn run_make(dir: &Path, targets: &[&str]) -> Result<(), BotError> {
    let output = Command::new("make")
        .arg("-C")
        .arg(dir)
        .args(targets)
        .output()
        .await
        .map_err(|e| BotError::Calculator(format!("failed to run make: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        error!(
            dir = %dir.display(),
            targets = ?targets,
            exit_code = ?output.status.code(),
            stderr = %stderr.trim(),
            "make failed"
        );
        return Err(BotError::Calculator(format!(
            "make {} failed with status {:?}",
            targets.join(" "),
            output.status.code()
        )));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
