use std::io::ErrorKind;
use std::time::{Duration, Instant};

use tracing::debug;

use kbglow_common::codec::ChannelCodec;
use kbglow_common::types::{AttributeHandle, ControlValue, Verification};

pub const DEFAULT_VERIFY_TIMEOUT: Duration = Duration::from_millis(500);

const INITIAL_BACKOFF: Duration = Duration::from_millis(10);

/// Poll the attribute until it reads back as `expected` or the budget runs
/// out. Drivers may apply a write asynchronously, so a zero-exit helper is
/// not proof the device actually changed; this is.
///
/// Write-only attributes report [`Verification::Unsupported`] immediately.
/// Transient read or decode failures while polling count as "no match yet",
/// not as hard errors.
pub async fn verify(
    handle: &AttributeHandle,
    expected: &ControlValue,
    codec: &ChannelCodec,
    total: Duration,
) -> Verification {
    if !handle.readable {
        return Verification::Unsupported;
    }

    let deadline = Instant::now() + total;
    let mut backoff = INITIAL_BACKOFF;
    let mut observed: Option<ControlValue> = None;
    loop {
        match tokio::fs::read(&handle.path).await {
            Ok(raw) => match codec.decode(&raw) {
                Ok(value) if &value == expected => {
                    debug!(path = %handle.path.display(), "read-back confirmed");
                    return Verification::Confirmed;
                }
                Ok(value) => observed = Some(value),
                Err(_) => {}
            },
            // Mode bits said readable, but not by us.
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                return Verification::Unsupported
            }
            Err(_) => {}
        }

        let now = Instant::now();
        if now >= deadline {
            return Verification::Mismatch { observed };
        }
        tokio::time::sleep(backoff.min(deadline - now)).await;
        backoff = backoff.saturating_mul(2);
    }
}
