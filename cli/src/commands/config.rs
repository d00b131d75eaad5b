use anyhow::{Context, Result};
use bioauth_core::BioAuthConfig;
use clap::Args;

#[derive(Args)]
pub struct ConfigArgs {
    /// Print the default config file location instead
    #[arg(long)]
    path: bool,
}

pub async fn execute(args: ConfigArgs, config: &BioAuthConfig) -> Result<()> {
    if args.path {
        match BioAuthConfig::default_path() {
            Some(path) => println!("{}", path.display()),
            None => println!("(no config directory on this platform)"),
        }
        return Ok(());
    }

    let rendered = toml::to_string_pretty(config).context("Failed to serialize configuration")?;
    print!("{}", rendered);
    Ok(())
}
