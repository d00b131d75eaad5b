use anyhow::Result;
use bioauth_core::{BioAuthConfig, CapabilityChecker, CapabilityStatus};
use clap::Args;
use colored::*;
use serde::Serialize;
use std::sync::Arc;

use crate::device::DeviceArgs;

#[derive(Args)]
pub struct CheckArgs {
    #[command(flatten)]
    device: DeviceArgs,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    format: String,
}

#[derive(Serialize)]
struct CheckReport {
    status: CapabilityStatus,
    available: bool,
}

pub async fn execute(args: CheckArgs, _config: &BioAuthConfig) -> Result<()> {
    let platform = Arc::new(args.device.build());
    let status = CapabilityChecker::new(platform).check();

    match args.format.as_str() {
        "text" => {
            let label = if status.is_available() {
                status.to_string().green().bold()
            } else {
                status.to_string().yellow().bold()
            };
            println!("Strong biometric: {}", label);
        }
        "json" => {
            let report = CheckReport {
                status,
                available: status.is_available(),
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ => anyhow::bail!("Unsupported output format: {}", args.format),
    }

    Ok(())
}
