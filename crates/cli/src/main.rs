use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use kbglow_backend_sysfs::apply::{apply, ApplyOptions};
use kbglow_backend_sysfs::resolver::Resolver;
use kbglow_common::codec::ChannelCodec;
use kbglow_common::types::{
    ControlValue, DeviceIdentifier, HelperSpec, PrivilegePolicy, WriteOutcome,
};
use kbglowctl::{Cli, Commands, SetArgs};

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging();
    let cli = Cli::parse();
    let resolver = Resolver::with_root(&cli.root);

    match cli.command {
        Commands::List => {
            let devices = resolver.enumerate()?;
            println!("{}", serde_json::to_string_pretty(&devices)?);
        }
        Commands::Get(args) => {
            let id: DeviceIdentifier = args.device.parse()?;
            let handle = resolver.resolve(&id, &args.attr, &ChannelCodec::rgb())?;
            match handle.last_known {
                Some(value) => println!("{}", value),
                None => {
                    eprintln!(
                        "{} is {}",
                        handle.path.display(),
                        if handle.readable {
                            "readable but does not hold a decodable value"
                        } else {
                            "write-only"
                        }
                    );
                    std::process::exit(1);
                }
            }
        }
        Commands::Set(args) => {
            let id: DeviceIdentifier = args.device.parse()?;
            let codec =
                ChannelCodec::rgb().with_trailing_newline(args.newline);
            // The operand uses the same format the attribute does.
            let value: ControlValue = codec
                .decode(args.value.as_bytes())
                .map_err(|e| anyhow::anyhow!("{e} (expected R,G,B)"))?;
            let opts = ApplyOptions {
                attribute: args.attr.clone(),
                policy: policy_from_args(&args),
                helper_timeout: Duration::from_secs(args.helper_timeout_secs),
                verify_timeout: Duration::from_millis(args.verify_ms),
                codec,
            };

            let outcome = apply(&resolver, &id, &value, &opts).await?;
            match &outcome {
                WriteOutcome::Success => println!("OK"),
                WriteOutcome::VerificationUnsupported => {
                    println!("OK");
                    eprintln!("note: attribute is write-only; value was not read back");
                }
                other => {
                    eprintln!("{}", serde_json::to_string_pretty(other)?);
                    std::process::exit(1);
                }
            }
        }
    }
    Ok(())
}

fn policy_from_args(args: &SetArgs) -> PrivilegePolicy {
    if args.direct {
        return PrivilegePolicy::AssumeAlreadyPrivileged;
    }
    let mut helper_args = args.helper_args.clone();
    if helper_args.is_empty() && args.helper == "sudo" {
        if args.non_interactive {
            helper_args.push("-n".to_string());
        }
        helper_args.push("tee".to_string());
    }
    PrivilegePolicy::EscalateViaHelper(HelperSpec {
        program: args.helper.clone(),
        args: helper_args,
    })
}

fn setup_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr);
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}
