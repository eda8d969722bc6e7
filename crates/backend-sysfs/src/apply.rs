use std::io;
use std::time::Duration;

use tracing::{info, warn};

use kbglow_common::codec::ChannelCodec;
use kbglow_common::types::{
    ControlValue, DeviceIdentifier, HelperSpec, PrivilegePolicy, Verification, WriteOutcome,
};

use crate::lock::PathLock;
use crate::resolver::{ResolveError, Resolver};
use crate::{verifier, writer};

pub const DEFAULT_ATTRIBUTE: &str = "rgb_color";

#[derive(Debug, Clone)]
pub struct ApplyOptions {
    pub attribute: String,
    pub policy: PrivilegePolicy,
    pub helper_timeout: Duration,
    /// Zero skips verification entirely.
    pub verify_timeout: Duration,
    pub codec: ChannelCodec,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            attribute: DEFAULT_ATTRIBUTE.to_string(),
            policy: PrivilegePolicy::EscalateViaHelper(HelperSpec::default()),
            helper_timeout: writer::DEFAULT_HELPER_TIMEOUT,
            verify_timeout: verifier::DEFAULT_VERIFY_TIMEOUT,
            codec: ChannelCodec::rgb(),
        }
    }
}

/// One bounded operation: resolve, lock, encode, write, verify.
///
/// Resolver failures are the only `Err`; everything on the write path comes
/// back as a typed [`WriteOutcome`]. A verification mismatch is reported but
/// never rolled back.
pub async fn apply(
    resolver: &Resolver,
    id: &DeviceIdentifier,
    value: &ControlValue,
    opts: &ApplyOptions,
) -> Result<WriteOutcome, ResolveError> {
    let handle = resolver.resolve(id, &opts.attribute, &opts.codec)?;

    // Held across write+verify so concurrent callers serialize per path.
    let lock_path = handle.path.clone();
    let _lock = tokio::task::spawn_blocking(move || PathLock::acquire(&lock_path))
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))??;

    let payload = opts.codec.encode(value);
    info!(device = %id, value = %value, path = %handle.path.display(), "writing attribute");
    let outcome = writer::write_attribute(&handle, &payload, &opts.policy, opts.helper_timeout).await;

    if !matches!(outcome, WriteOutcome::Success) || opts.verify_timeout.is_zero() {
        return Ok(outcome);
    }

    match verifier::verify(&handle, value, &opts.codec, opts.verify_timeout).await {
        Verification::Confirmed => Ok(WriteOutcome::Success),
        Verification::Unsupported => Ok(WriteOutcome::VerificationUnsupported),
        Verification::Mismatch { observed } => {
            warn!(device = %id, expected = %value, "read-back mismatch");
            Ok(WriteOutcome::VerificationFailed {
                expected: value.clone(),
                observed,
            })
        }
    }
}
