use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use kbglow_common::codec::ChannelCodec;
use kbglow_common::types::{AttributeHandle, DeviceIdentifier};

pub const DEFAULT_SYSFS_ROOT: &str = "/sys/bus/hid/devices";

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("no writable attribute {attribute:?} for device {identifier} under {root}")]
    DeviceNotFound {
        identifier: String,
        attribute: String,
        root: PathBuf,
    },
    #[error("identifier {identifier} matches several devices ({candidates:?}); add an interface suffix")]
    AmbiguousMatch {
        identifier: String,
        candidates: Vec<String>,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// One entry of the device tree, as shown by `kbglowctl list` so users can
/// find their vendor:product pair without reaching for `lsusb`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiscoveredDevice {
    pub name: String,
    pub vendor_id: String,
    pub product_id: String,
    pub instance: u32,
}

/// Locates the control file for a device inside a sysfs-like tree. Purely
/// read-only; every call walks the tree fresh.
#[derive(Debug, Clone)]
pub struct Resolver {
    root: PathBuf,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver {
    pub fn new() -> Self {
        Self::with_root(DEFAULT_SYSFS_ROOT)
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// List every parseable entry under the root, sorted by name.
    pub fn enumerate(&self) -> Result<Vec<DiscoveredDevice>, ResolveError> {
        let mut devices = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some((vendor, product, instance)) = parse_entry_name(&name) {
                devices.push(DiscoveredDevice {
                    name,
                    vendor_id: format!("0x{:04x}", vendor),
                    product_id: format!("0x{:04x}", product),
                    instance,
                });
            }
        }
        devices.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(devices)
    }

    /// Find the single tree entry matching `id`, then hand back the named
    /// attribute file underneath it with its access metadata. The current
    /// value is read opportunistically when the attribute is readable.
    pub fn resolve(
        &self,
        id: &DeviceIdentifier,
        attribute: &str,
        codec: &ChannelCodec,
    ) -> Result<AttributeHandle, ResolveError> {
        let not_found = || ResolveError::DeviceNotFound {
            identifier: id.to_string(),
            attribute: attribute.to_string(),
            root: self.root.clone(),
        };

        let mut candidates: Vec<(String, u32)> = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some((vendor, product, instance)) = parse_entry_name(&name) {
                if vendor == id.vendor && product == id.product {
                    candidates.push((name, instance));
                }
            }
        }
        candidates.sort_by(|a, b| a.0.cmp(&b.0));

        let chosen = match id.interface {
            Some(wanted) => candidates
                .iter()
                .find(|(_, instance)| *instance == u32::from(wanted))
                .ok_or_else(not_found)?,
            None => match candidates.len() {
                0 => return Err(not_found()),
                1 => &candidates[0],
                _ => {
                    return Err(ResolveError::AmbiguousMatch {
                        identifier: id.to_string(),
                        candidates: candidates.into_iter().map(|(name, _)| name).collect(),
                    })
                }
            },
        };

        let path = self.root.join(&chosen.0).join(attribute);
        let meta = match fs::metadata(&path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
            Err(e) => return Err(e.into()),
        };
        let mode = meta.permissions().mode();
        // Writable by *some* principal is enough; the writer decides whether
        // escalation is needed for this caller. A file nobody may write is
        // not a control file at all.
        let readable = mode & 0o444 != 0;
        let writable = mode & 0o222 != 0;
        if !writable {
            return Err(not_found());
        }

        let last_known = if readable {
            fs::read(&path).ok().and_then(|raw| codec.decode(&raw).ok())
        } else {
            None
        };

        debug!(
            device = %id,
            path = %path.display(),
            readable,
            writable,
            "resolved attribute"
        );
        Ok(AttributeHandle {
            path,
            readable,
            writable,
            last_known,
        })
    }
}

// Entry names look like 0003:320F:5055.0003 (bus:vendor:product.instance,
// all hex).
fn parse_entry_name(name: &str) -> Option<(u16, u16, u32)> {
    let (head, instance) = name.rsplit_once('.')?;
    let instance = u32::from_str_radix(instance, 16).ok()?;
    let mut parts = head.split(':');
    let _bus = parts.next()?;
    let vendor = u16::from_str_radix(parts.next()?, 16).ok()?;
    let product = u16::from_str_radix(parts.next()?, 16).ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((vendor, product, instance))
}

#[cfg(test)]
mod tests {
    use super::*;
    use kbglow_common::types::ControlValue;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    fn fake_tree() -> TempDir {
        let dir = tempfile::tempdir().expect("tempdir");
        for (entry, value) in [
            ("0003:320F:5055.0003", Some("0,0,0")),
            ("0003:320F:5055.0005", Some("9,9,9")),
            ("0003:1234:ABCD.0001", Some("1,2,3")),
            ("0003:AAAA:BBBB.0002", None),
        ] {
            let devdir = dir.path().join(entry);
            fs::create_dir(&devdir).expect("mkdir");
            if let Some(value) = value {
                let mut f = File::create(devdir.join("rgb_color")).expect("create");
                f.write_all(value.as_bytes()).expect("write");
            }
        }
        dir
    }

    #[test]
    fn unique_match_resolves() {
        let tree = fake_tree();
        let resolver = Resolver::with_root(tree.path());
        let handle = resolver
            .resolve(
                &DeviceIdentifier::new(0x1234, 0xabcd),
                "rgb_color",
                &ChannelCodec::rgb(),
            )
            .expect("resolve");
        assert!(handle.readable);
        assert!(handle.writable);
        assert_eq!(handle.last_known, Some(ControlValue::rgb(1, 2, 3)));
    }

    #[test]
    fn duplicate_pair_needs_interface() {
        let tree = fake_tree();
        let resolver = Resolver::with_root(tree.path());
        let id = DeviceIdentifier::new(0x320f, 0x5055);
        match resolver.resolve(&id, "rgb_color", &ChannelCodec::rgb()) {
            Err(ResolveError::AmbiguousMatch { candidates, .. }) => {
                assert_eq!(candidates.len(), 2);
            }
            other => panic!("expected AmbiguousMatch, got {:?}", other.map(|_| ())),
        }

        let handle = resolver
            .resolve(&id.with_interface(5), "rgb_color", &ChannelCodec::rgb())
            .expect("resolve .5");
        assert_eq!(handle.last_known, Some(ControlValue::rgb(9, 9, 9)));
    }

    #[test]
    fn missing_device_or_interface() {
        let tree = fake_tree();
        let resolver = Resolver::with_root(tree.path());
        for id in [
            DeviceIdentifier::new(0xdead, 0xbeef),
            DeviceIdentifier::new(0x320f, 0x5055).with_interface(9),
        ] {
            assert!(matches!(
                resolver.resolve(&id, "rgb_color", &ChannelCodec::rgb()),
                Err(ResolveError::DeviceNotFound { .. })
            ));
        }
    }

    #[test]
    fn missing_attribute_is_not_found() {
        let tree = fake_tree();
        let resolver = Resolver::with_root(tree.path());
        let id = DeviceIdentifier::new(0xaaaa, 0xbbbb);
        assert!(matches!(
            resolver.resolve(&id, "rgb_color", &ChannelCodec::rgb()),
            Err(ResolveError::DeviceNotFound { .. })
        ));
    }

    #[test]
    fn write_only_attribute_has_no_cached_value() {
        let tree = fake_tree();
        let path = tree.path().join("0003:1234:ABCD.0001/rgb_color");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o200)).expect("chmod");

        let resolver = Resolver::with_root(tree.path());
        let handle = resolver
            .resolve(
                &DeviceIdentifier::new(0x1234, 0xabcd),
                "rgb_color",
                &ChannelCodec::rgb(),
            )
            .expect("resolve");
        assert!(!handle.readable);
        assert!(handle.writable);
        assert_eq!(handle.last_known, None);
    }

    #[test]
    fn read_only_attribute_is_not_a_control_file() {
        let tree = fake_tree();
        let path = tree.path().join("0003:1234:ABCD.0001/rgb_color");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o444)).expect("chmod");

        let resolver = Resolver::with_root(tree.path());
        assert!(matches!(
            resolver.resolve(
                &DeviceIdentifier::new(0x1234, 0xabcd),
                "rgb_color",
                &ChannelCodec::rgb(),
            ),
            Err(ResolveError::DeviceNotFound { .. })
        ));
    }

    #[test]
    fn enumerate_lists_parseable_entries() {
        let tree = fake_tree();
        let resolver = Resolver::with_root(tree.path());
        let devices = resolver.enumerate().expect("enumerate");
        assert_eq!(devices.len(), 4);
        assert!(devices
            .iter()
            .any(|d| d.vendor_id == "0x320f" && d.product_id == "0x5055" && d.instance == 5));
        // Sorted by entry name.
        assert_eq!(devices[0].name, "0003:1234:ABCD.0001");
    }
}
