use super::Parser;

#[derive(Parser, Debug)]
#[command(name = "cadence", about = "Credential and session token service")]
pub struct Cli {
    /// Path to a settings file, without or with the `.toml` extension.
    #[arg(long)]
    pub settings: Option<String>,
}
