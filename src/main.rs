use std::net::{IpAddr, Ipv4Addr};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use axum::Router;
use clap::Parser;

use pusher::discovery::{iface, mdns::MdnsClient, Scanner};
use pusher::http::state::{ControlState, MediaState};
use pusher::media::catalog::MediaLinks;
use pusher::session::{tcp::TcpConnector, SessionManager, SessionRegistry};
use pusher::{cli, config, http};

/// Set to true once the first Ctrl+C is received. Second Ctrl+C force-exits.
static SHUTTING_DOWN: AtomicBool = AtomicBool::new(false);

/// Wait for the first Ctrl+C (graceful shutdown).
/// On second Ctrl+C (during shutdown wait), force-exits immediately.
async fn wait_for_shutdown() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        eprintln!("error: failed to install Ctrl+C handler: {e}");
        std::process::exit(1);
    }
    if SHUTTING_DOWN.swap(true, Ordering::SeqCst) {
        eprintln!("\npusher: forced exit");
        std::process::exit(1);
    }
}

/// Address receivers use to reach the media server.
fn advertised_address(config: &config::Config) -> IpAddr {
    if config.localhost {
        return IpAddr::V4(Ipv4Addr::LOCALHOST);
    }
    if let Some(addr) = config.advertise {
        return addr;
    }
    match iface::local_ipv4() {
        Some(addr) => IpAddr::V4(addr),
        None => {
            tracing::warn!("No LAN IPv4 interface found -- media URLs will point at 127.0.0.1");
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }
    }
}

async fn bind(host: &str, port: u16, what: &str) -> tokio::net::TcpListener {
    let addr = format!("{host}:{port}");
    tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            eprintln!("error: failed to bind {what} server on {addr}: {e}");
            std::process::exit(1);
        })
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = cli::Args::parse();

    let file_config = config::find_config_file(args.config.as_deref()).map(|path| {
        match config::load_config(&path) {
            Ok(cfg) => {
                tracing::debug!("Loaded config from {}", path.display());
                cfg
            }
            Err(e) => {
                eprintln!("error: {} ({})", e, path.display());
                std::process::exit(1);
            }
        }
    });

    let config = config::Config::resolve(file_config, &args);

    let advertised = advertised_address(&config);
    let links = MediaLinks::new(advertised, config.media_port).unwrap_or_else(|e| {
        eprintln!("error: cannot build media URL base for {advertised}: {e}");
        std::process::exit(1);
    });

    let scanner = Scanner::new(Arc::new(MdnsClient));
    let sessions = SessionManager::new(
        SessionRegistry::new(),
        scanner,
        Arc::new(TcpConnector::new(config.connect_timeout)),
        links.clone(),
    );
    let control_app = http::build_control_router(ControlState {
        sessions: Arc::new(sessions),
        default_wait: config.wait,
    });
    let media_app = http::build_media_router(MediaState::new(links.clone()));

    let host = if config.localhost { "127.0.0.1" } else { "0.0.0.0" };
    let control_listener = bind(host, config.port, "control").await;
    let media_listener = bind(host, config.media_port, "media").await;

    tracing::info!("pusher {} control API on http://{}:{}", env!("GIT_VERSION"), host, config.port);
    tracing::info!("Media served as {}", links.base());

    run(control_listener, control_app, media_listener, media_app).await;
}

/// Serve both routers until Ctrl+C, then drain in-flight requests.
async fn run(
    control_listener: tokio::net::TcpListener,
    control_app: Router,
    media_listener: tokio::net::TcpListener,
    media_app: Router,
) {
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(4);

    let mut control_rx = shutdown_tx.subscribe();
    let control_task = tokio::spawn(async move {
        axum::serve(control_listener, control_app)
            .with_graceful_shutdown(async move {
                let _ = control_rx.recv().await;
            })
            .await
            .unwrap_or_else(|e| tracing::error!("Control server error: {}", e));
    });

    let mut media_rx = shutdown_tx.subscribe();
    let media_task = tokio::spawn(async move {
        axum::serve(media_listener, media_app)
            .with_graceful_shutdown(async move {
                let _ = media_rx.recv().await;
            })
            .await
            .unwrap_or_else(|e| tracing::error!("Media server error: {}", e));
    });

    wait_for_shutdown().await;
    tracing::info!("Shutting down...");
    let _ = shutdown_tx.send(());

    // Give in-flight requests a moment; a second Ctrl+C exits immediately.
    let drain = async {
        let _ = control_task.await;
        let _ = media_task.await;
    };
    tokio::select! {
        _ = drain => {}
        _ = tokio::time::sleep(std::time::Duration::from_secs(5)) => {
            tracing::warn!("Timed out waiting for requests to drain");
        }
        _ = wait_for_shutdown() => {}
    }

    tracing::info!("Goodbye.");
}
