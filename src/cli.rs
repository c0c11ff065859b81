//! Command line surface.

use clap::Parser;

/// Prometheus exporter for the 389 Directory Server.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short, long, default_value_t = String::from("/etc/ds389-exporter.yml"))]
    pub config_file: String,

    /// Validate the configuration, print it with secrets masked, and exit.
    #[arg(long)]
    pub check_config: bool,
}
