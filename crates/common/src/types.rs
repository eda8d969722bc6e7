use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Selects which device on the bus to target. Vendor and product are the
/// USB/HID ids; `interface` is the instance suffix of the sysfs entry
/// (the `NNNN` in `0003:VVVV:PPPP.NNNN`) and disambiguates when the same
/// vendor:product pair is enumerated more than once.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceIdentifier {
    pub vendor: u16,
    pub product: u16,
    pub interface: Option<u8>,
}

impl DeviceIdentifier {
    pub fn new(vendor: u16, product: u16) -> Self {
        Self {
            vendor,
            product,
            interface: None,
        }
    }

    pub fn with_interface(mut self, interface: u8) -> Self {
        self.interface = Some(interface);
        self
    }
}

impl fmt::Display for DeviceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}:{:04x}", self.vendor, self.product)?;
        if let Some(i) = self.interface {
            write!(f, ".{:x}", i)?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
#[error("expected VVVV:PPPP[.I] hex identifier, got {0:?}")]
pub struct ParseIdentifierError(pub String);

impl FromStr for DeviceIdentifier {
    type Err = ParseIdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || ParseIdentifierError(s.to_string());
        let (head, interface) = match s.split_once('.') {
            Some((head, i)) => (head, Some(u8::from_str_radix(i, 16).map_err(|_| bad())?)),
            None => (s, None),
        };
        let (v, p) = head.split_once(':').ok_or_else(bad)?;
        Ok(Self {
            vendor: u16::from_str_radix(v, 16).map_err(|_| bad())?,
            product: u16::from_str_radix(p, 16).map_err(|_| bad())?,
            interface,
        })
    }
}

/// One composite value for a multi-channel control attribute. Channel range
/// is carried by the type; arity is enforced by the codec that owns the
/// attribute's format contract.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ControlValue {
    pub channels: Vec<u8>,
}

impl ControlValue {
    pub fn new(channels: Vec<u8>) -> Self {
        Self { channels }
    }

    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self {
            channels: vec![r, g, b],
        }
    }
}

impl fmt::Display for ControlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, c) in self.channels.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}

/// A resolved control file plus the metadata the write/verify path needs.
/// Produced fresh by the resolver on every call; device attachment can
/// change between invocations, so handles are never cached.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttributeHandle {
    pub path: PathBuf,
    pub readable: bool,
    pub writable: bool,
    pub last_known: Option<ControlValue>,
}

/// External privilege-elevation command, e.g. `sudo tee`. The target path is
/// appended as the single trailing argument; the encoded value always
/// travels on stdin so it never shows up in the process list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HelperSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl Default for HelperSpec {
    fn default() -> Self {
        Self {
            program: "sudo".to_string(),
            args: vec!["tee".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum PrivilegePolicy {
    /// The calling process can already write the attribute directly.
    AssumeAlreadyPrivileged,
    /// Route the write through an external elevation helper.
    EscalateViaHelper(HelperSpec),
}

/// Terminal result of one write+verify operation. Every variant is
/// recoverable at the caller boundary; the presentation layer decides how
/// to render it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum WriteOutcome {
    Success,
    /// The helper refused (wrong credential, policy denial) or the direct
    /// write hit EACCES. Retrying with fresh credentials may help.
    PermissionDenied { detail: String },
    /// The helper binary is not on the search path. Retrying is pointless
    /// until it is installed.
    ToolMissing { helper: String },
    /// The write reached the driver and the driver said no, or the device
    /// went away mid-write.
    DriverRejected { reason: String },
    /// The write looked fine but the read-back never matched within the
    /// verification budget.
    VerificationFailed {
        expected: ControlValue,
        observed: Option<ControlValue>,
    },
    /// The attribute is write-only; the value was written but cannot be
    /// confirmed. Not a failure.
    VerificationUnsupported,
}

impl WriteOutcome {
    /// True when the value was handed to the device without any reported
    /// error, whether or not a read-back confirmed it.
    pub fn applied(&self) -> bool {
        matches!(
            self,
            WriteOutcome::Success | WriteOutcome::VerificationUnsupported
        )
    }
}

/// Verifier result, folded into a [`WriteOutcome`] by the orchestration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Verification {
    Confirmed,
    Mismatch { observed: Option<ControlValue> },
    Unsupported,
}
