//! CLI for minting API tokens
//!
//! Signs a JWT with the server's TOKEN_SECRET so operators can hand out
//! credentials for the guide-query endpoints without a login flow.

use anyhow::{Context, Result};
use clap::Parser;
use server_core::config::Config;
use server_core::domains::auth::JwtService;

#[derive(Parser)]
#[command(name = "generate_token")]
#[command(about = "Mint a JWT for the guide-query API")]
struct Cli {
    /// Subject recorded in the token (who the token is for)
    subject: String,

    /// Token lifetime in hours
    #[arg(long, default_value_t = 24)]
    hours: i64,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::from_env().context("Failed to load configuration")?;
    let jwt_service = JwtService::new(&config.token_secret, config.jwt_issuer.clone());

    let token = jwt_service
        .create_token_with_expiry(&cli.subject, chrono::Duration::hours(cli.hours))
        .context("Failed to sign token")?;

    println!("{}", token);
    Ok(())
}
