use clap::{Args, Parser, Subcommand};

use kbglow_backend_sysfs::resolver::DEFAULT_SYSFS_ROOT;

#[derive(Parser)]
#[command(name = "kbglowctl", version, about = "Keyboard RGB attribute control")]
pub struct Cli {
    /// Device tree to search (mainly for testing against a fake tree)
    #[arg(long, global = true, default_value = DEFAULT_SYSFS_ROOT)]
    pub root: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// List devices exposed under the tree
    List,
    /// Read and decode the current attribute value
    Get(GetArgs),
    /// Write a new value, escalating privilege if needed
    Set(SetArgs),
}

#[derive(Args, Clone)]
pub struct GetArgs {
    /// Device as VVVV:PPPP[.I] hex (see `kbglowctl list`)
    pub device: String,

    #[arg(long, default_value = "rgb_color")]
    pub attr: String,
}

#[derive(Args, Clone)]
pub struct SetArgs {
    /// Device as VVVV:PPPP[.I] hex (see `kbglowctl list`)
    pub device: String,

    /// Channels as R,G,B (0-255 each)
    pub value: String,

    #[arg(long, default_value = "rgb_color")]
    pub attr: String,

    /// Write directly instead of going through the elevation helper
    #[arg(long)]
    pub direct: bool,

    /// Privilege elevation program
    #[arg(long, default_value = "sudo")]
    pub helper: String,

    /// Arguments placed before the target path (repeatable). Defaults to
    /// "tee" when the helper is sudo.
    #[arg(long = "helper-arg")]
    pub helper_args: Vec<String>,

    /// Never allow the helper to prompt for a credential
    #[arg(long)]
    pub non_interactive: bool,

    /// Seconds to wait for the helper before giving up
    #[arg(long, default_value_t = 25)]
    pub helper_timeout_secs: u64,

    /// Read-back budget in milliseconds; 0 skips verification
    #[arg(long, default_value_t = 500)]
    pub verify_ms: u64,

    /// Append a trailing newline to the encoded value
    #[arg(long)]
    pub newline: bool,
}
