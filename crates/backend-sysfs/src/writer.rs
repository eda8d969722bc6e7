use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use kbglow_common::types::{AttributeHandle, HelperSpec, PrivilegePolicy, WriteOutcome};

pub const DEFAULT_HELPER_TIMEOUT: Duration = Duration::from_secs(25);

/// Write the encoded payload to the attribute, escalating through the
/// configured helper when the caller is not already privileged.
///
/// Credential failures are never retried here; the caller decides whether
/// to come back with fresh credentials.
pub async fn write_attribute(
    handle: &AttributeHandle,
    payload: &[u8],
    policy: &PrivilegePolicy,
    helper_timeout: Duration,
) -> WriteOutcome {
    match policy {
        PrivilegePolicy::AssumeAlreadyPrivileged => write_direct(handle, payload).await,
        PrivilegePolicy::EscalateViaHelper(helper) => {
            write_via_helper(handle, payload, helper, helper_timeout).await
        }
    }
}

async fn write_direct(handle: &AttributeHandle, payload: &[u8]) -> WriteOutcome {
    match tokio::fs::write(&handle.path, payload).await {
        Ok(()) => WriteOutcome::Success,
        Err(e) => match e.kind() {
            ErrorKind::PermissionDenied => WriteOutcome::PermissionDenied {
                detail: format!("write {}: {}", handle.path.display(), e),
            },
            ErrorKind::NotFound => WriteOutcome::DriverRejected {
                reason: format!(
                    "{} vanished mid-write; device detached?",
                    handle.path.display()
                ),
            },
            // sysfs store hooks report rejected values as EINVAL and
            // friends, which surface here on a direct write.
            _ => WriteOutcome::DriverRejected {
                reason: format!("write {}: {}", handle.path.display(), e),
            },
        },
    }
}

async fn write_via_helper(
    handle: &AttributeHandle,
    payload: &[u8],
    helper: &HelperSpec,
    helper_timeout: Duration,
) -> WriteOutcome {
    let mut cmd = Command::new(&helper.program);
    cmd.args(&helper.args)
        .arg(&handle.path)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!(helper = %helper.program, path = %handle.path.display(), "spawning privilege helper");
    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return WriteOutcome::ToolMissing {
                helper: helper.program.clone(),
            }
        }
        Err(e) => {
            return WriteOutcome::PermissionDenied {
                detail: format!("spawn {}: {}", helper.program, e),
            }
        }
    };

    if let Some(mut stdin) = child.stdin.take() {
        // EPIPE here just means the helper already gave up; its exit status
        // tells the story.
        let _ = stdin.write_all(payload).await;
        let _ = stdin.shutdown().await;
    }

    // kill_on_drop reaps the child if the deadline fires first; hanging on
    // a credential prompt forever is not an option in a non-interactive
    // caller.
    let output = match timeout(helper_timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            return WriteOutcome::PermissionDenied {
                detail: format!("waiting for {}: {}", helper.program, e),
            }
        }
        Err(_) => {
            warn!(helper = %helper.program, "privilege helper timed out");
            return WriteOutcome::PermissionDenied {
                detail: format!(
                    "{} timed out after {:?}; credential prompt in a non-interactive session?",
                    helper.program, helper_timeout
                ),
            };
        }
    };

    if output.status.success() {
        return WriteOutcome::Success;
    }

    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    let detail = if stderr.is_empty() {
        format!("{} exited with {}", helper.program, output.status)
    } else {
        stderr.clone()
    };
    // Writing tools like tee prefix write errors with the target path; the
    // elevation tool's own refusals never mention it. That distinguishes a
    // driver rejection from a credential problem.
    if stderr.contains(handle.path.to_string_lossy().as_ref()) {
        WriteOutcome::DriverRejected { reason: detail }
    } else {
        WriteOutcome::PermissionDenied { detail }
    }
}
