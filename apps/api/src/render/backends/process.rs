//! Helpers shared by the backends that shell out to an external renderer.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::BackendError;

/// Finds an executable, in order: the explicit override, the well-known
/// install locations, then every directory on `PATH`.
///
/// A configured override that does not exist is ignored (and reported by the
/// caller) rather than treated as fatal.
pub fn locate_binary(name: &str, explicit: Option<&Path>, well_known: &[&str]) -> Option<PathBuf> {
    if let Some(path) = explicit {
        if path.is_file() {
            return Some(path.to_path_buf());
        }
    }

    if let Some(path) = well_known.iter().map(PathBuf::from).find(|p| p.is_file()) {
        return Some(path);
    }

    search_path(name, std::env::var_os("PATH").as_deref())
}

fn search_path(name: &str, path_var: Option<&OsStr>) -> Option<PathBuf> {
    let path_var = path_var?;
    let candidates: Vec<String> = if cfg!(windows) {
        vec![format!("{name}.exe"), name.to_string()]
    } else {
        vec![name.to_string()]
    };

    std::env::split_paths(path_var).find_map(|dir| {
        candidates
            .iter()
            .map(|file| dir.join(file))
            .find(|candidate| candidate.is_file())
    })
}

/// Runs `binary args...`, writes `input` to its stdin and returns stdout.
///
/// The child is killed if the returned future is dropped, so wrapping the
/// call in a timeout never leaves a hung renderer behind.
pub async fn run_piped(binary: &Path, args: &[String], input: &[u8]) -> Result<Vec<u8>, BackendError> {
    debug!("Spawning {} {}", binary.display(), args.join(" "));

    let mut child = Command::new(binary)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| BackendError::Generation(format!("failed to start {}: {e}", binary.display())))?;

    // Feed stdin while draining stdout so neither pipe can fill up and stall.
    let stdin = child.stdin.take();
    let feed = async move {
        if let Some(mut stdin) = stdin {
            stdin.write_all(input).await?;
            // Dropping stdin closes the pipe so the renderer sees EOF.
        }
        Ok::<(), std::io::Error>(())
    };
    let (fed, output) = tokio::join!(feed, child.wait_with_output());

    let output =
        output.map_err(|e| BackendError::Generation(format!("failed to collect output: {e}")))?;
    fed.map_err(|e| BackendError::Generation(format!("failed to write input: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(BackendError::Generation(format!(
            "{} exited with {}: {}",
            binary.display(),
            output.status,
            excerpt(stderr.trim(), 400)
        )));
    }

    Ok(output.stdout)
}

fn excerpt(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{cut}…")
}
