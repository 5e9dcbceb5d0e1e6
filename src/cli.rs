use clap::Parser;
use std::net::IpAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "pusher",
    about = "Discover cast receivers, keep control sessions, and serve local media to them",
    long_about = None,
    version = env!("GIT_VERSION"),
)]
pub struct Args {
    /// Control API port (/devices, /connect, /disconnect, /load) [default: 8011]
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Media server port receivers fetch files from [default: 9002]
    #[arg(short, long)]
    pub media_port: Option<u16>,

    /// Address put into media URLs handed to receivers [default: first LAN IPv4]
    #[arg(short, long, value_name = "IP")]
    pub advertise: Option<IpAddr>,

    /// Default discovery window in seconds when a request gives none [default: 3]
    #[arg(short, long, value_name = "SECS")]
    pub wait: Option<u64>,

    /// Seconds to wait for a receiver's control port to accept [default: 5]
    #[arg(long, value_name = "SECS")]
    pub connect_timeout: Option<u64>,

    /// Path to TOML config file (overrides default search: ./pusher.toml, ~/.config/pusher/config.toml)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Bind both servers to localhost only (127.0.0.1) instead of all interfaces
    #[arg(long)]
    pub localhost: bool,
}
