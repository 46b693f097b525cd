// gitvault-core/src/auth/helper.rs
//
// Invocation of external UI helper executables over the same `key=value`
// block protocol Git uses: we write an optional block to the child's
// stdin, read one block from its stdout, and treat a non-zero exit code as
// fatal (the error text comes from the child's `error=` key, defaulting to
// "Unknown"). Cancellation kills the child.

use std::collections::HashMap;
use std::io::Write as _;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use gitvault_common::error::Error;

use crate::protocol;

/// Trait seam over [`invoke_helper`] so provider negotiation logic can be
/// tested against a scripted helper.
#[async_trait]
pub trait HelperRunner: Send + Sync {
    async fn invoke(
        &self,
        path: &str,
        args: &[String],
        stdin_block: Option<&[(String, String)]>,
        cancel: &CancellationToken,
    ) -> Result<HashMap<String, String>, Error>;
}

#[derive(Default)]
pub struct ProcessHelperRunner;

#[async_trait]
impl HelperRunner for ProcessHelperRunner {
    async fn invoke(
        &self,
        path: &str,
        args: &[String],
        stdin_block: Option<&[(String, String)]>,
        cancel: &CancellationToken,
    ) -> Result<HashMap<String, String>, Error> {
        invoke_helper(path, args, stdin_block, cancel).await
    }
}

pub async fn invoke_helper(
    path: &str,
    args: &[String],
    stdin_block: Option<&[(String, String)]>,
    cancel: &CancellationToken,
) -> Result<HashMap<String, String>, Error> {
    debug!("starting helper process: {} {}", path, args.join(" "));

    // Flush our own buffered output first so the helper's terminal output
    // does not interleave with ours.
    let _ = std::io::stdout().flush();
    let _ = std::io::stderr().flush();

    let mut child = Command::new(path)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| Error::Helper(format!("failed to start helper process '{}': {}", path, e)))?;

    // Write the input block (if any), then close stdin so the child sees
    // the end of the dictionary.
    if let Some(mut stdin) = child.stdin.take() {
        if let Some(block) = stdin_block {
            let mut buf = Vec::new();
            protocol::write_dictionary(&mut buf, block)?;
            stdin.write_all(&buf).await?;
        }
        drop(stdin);
    }

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| Error::Helper("helper stdout was not captured".to_string()))?;
    let reader = tokio::io::BufReader::new(stdout);

    let result = tokio::select! {
        r = protocol::read_dictionary_async(reader, true) => r?,
        _ = cancel.cancelled() => {
            let _ = child.kill().await;
            return Err(Error::Cancelled("helper invocation".to_string()));
        }
    };

    // Dropping the child on the cancellation path kills it (kill_on_drop).
    let status = tokio::select! {
        s = child.wait() => s?,
        _ = cancel.cancelled() => {
            return Err(Error::Cancelled("helper invocation".to_string()));
        }
    };

    if !status.success() {
        let message = result
            .get("error")
            .cloned()
            .unwrap_or_else(|| "Unknown".to_string());
        return Err(Error::Helper(format!(
            "helper error ({}): {}",
            status.code().unwrap_or(-1),
            message
        )));
    }

    Ok(result)
}

/// Resolves the helper executable for a provider.
///
/// An operator override of the empty string disables the helper entirely.
/// Relative override paths (and the in-box default name) are resolved next
/// to the running executable. Only missing *override* paths warrant a
/// warning; a missing in-box helper just means "no helper".
pub fn find_helper(override_path: Option<&str>, default_name: &str) -> Option<PathBuf> {
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(PathBuf::from));

    match override_path {
        Some("") => None,
        Some(name) => {
            let path = PathBuf::from(name);
            let path = if path.is_absolute() {
                path
            } else {
                exe_dir?.join(path)
            };
            if path.is_file() {
                Some(path)
            } else {
                warn!("configured UI helper '{}' was not found at {:?}", name, path);
                None
            }
        }
        None => {
            let path = exe_dir?.join(default_name);
            path.is_file().then_some(path)
        }
    }
}

pub fn is_truthy(value: Option<&String>) -> bool {
    value.is_some_and(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}
