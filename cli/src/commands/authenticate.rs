use anyhow::Result;
use bioauth_core::{AuthenticationFlow, AuthenticationResultText, BioAuthConfig};
use clap::Args;
use colored::*;
use std::sync::Arc;

use crate::device::DeviceArgs;

#[derive(Args)]
pub struct AuthenticateArgs {
    #[command(flatten)]
    device: DeviceArgs,

    /// Print what the simulated platform was asked to do
    #[arg(long)]
    trace_calls: bool,
}

pub async fn execute(args: AuthenticateArgs, config: &BioAuthConfig) -> Result<()> {
    let request = config.challenge_request()?;
    let platform = Arc::new(args.device.build());
    let flow = AuthenticationFlow::from_platform(platform.clone(), request);

    let text = flow.authenticate().await;
    let rendered = match text {
        AuthenticationResultText::Succeeded => text.as_str().green().bold(),
        AuthenticationResultText::Failed => text.as_str().red().bold(),
        AuthenticationResultText::Unavailable => text.as_str().yellow().bold(),
        AuthenticationResultText::NotAuthenticated => text.as_str().normal(),
    };
    println!("{}", rendered);

    if args.trace_calls {
        let calls = platform.calls();
        println!("availability queries: {}", calls.availability_queries);
        for request in &calls.challenges {
            println!("challenge: {} [{}]", request.title(), request.negative_button_text());
        }
        println!("enrollment launches: {}", calls.enrollment_launches.len());
        println!(
            "security settings launches: {}",
            calls.security_settings_launches
        );
        if let Some(outcome) = flow.last_outcome() {
            println!("outcome: {}", outcome);
        }
    }

    Ok(())
}
