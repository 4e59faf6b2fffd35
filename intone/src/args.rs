use std::{net::SocketAddr, path::PathBuf};

use clap::Parser;

/// HTTP front end for an emotion-controllable speech synthesis engine
#[derive(Debug, Parser)]
#[command(name = "intone", version, about)]
pub struct Args {
    /// Path to configuration file; built-in defaults apply when omitted
    #[arg(short, long, env = "INTONE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the listen address
    #[arg(long, env = "INTONE_LISTEN")]
    pub listen: Option<SocketAddr>,

    /// Log filter directive, used when `RUST_LOG` is unset
    #[arg(long, default_value = "info", env = "INTONE_LOG")]
    pub log: String,
}
