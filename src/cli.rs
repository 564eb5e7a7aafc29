use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "battery-reporter",
    version,
    about = "Smart-battery telemetry reporter: ioreg -> Notion"
)]
pub struct Cli {
    /// Extract metrics and print the report payload without contacting Notion.
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
    /// Skip remote schema reconciliation before uploading.
    #[arg(long, default_value_t = false)]
    pub skip_schema: bool,
    /// Load environment variables from this file instead of ./.env.
    #[arg(long)]
    pub env_file: Option<PathBuf>,
}
