//! OpenSASE Demo Data - storefront reset service and CLI

use anyhow::Result;
use clap::Parser;

use opensase_demo_data::cli::{self, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    opensase_demo_data::logging::init(&cli.log_level);
    cli::execute(cli).await
}
