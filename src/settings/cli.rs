use super::Parser;

/// Token lifecycle gateway.
#[derive(Parser, Debug)]
#[command(name = "tokengate", version, about)]
pub struct Cli {
    /// Settings file; defaults to `settings/dev.toml` (debug) or
    /// `settings/release.toml` (release).
    #[arg(long)]
    pub settings: Option<String>,
}
