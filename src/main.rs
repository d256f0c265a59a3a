//! Headline relay — binary entrypoint.
//! Loads config, starts the query API (+ optional mDNS), then runs the poll
//! loop until Ctrl-C / SIGTERM.

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use headline_relay::api::{self, AppState};
use headline_relay::config::AppConfig;
use headline_relay::metrics::Metrics;
use headline_relay::scheduler::{LatestSnapshot, PollLoop};
use headline_relay::{delivery, mdns, poll_cfg, sources_from_config};

/// `RUST_LOG` wins; otherwise info for this crate and warn for dependencies.
/// `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("headline_relay=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "ctrl-c handler failed");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler failed");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::load_default()?;
    tracing::info!(
        feeds = cfg.feeds.len(),
        slots = cfg.headline_slots,
        poll_secs = cfg.poll_interval_secs,
        min_push_secs = cfg.debounce.min_interval_secs,
        rate_limit_by = ?cfg.debounce.rate_limit_by,
        "relay config loaded"
    );

    let sources = sources_from_config(&cfg)?;
    let transport = delivery::from_config(&cfg.transport)?;
    let latest = LatestSnapshot::new();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // --- Query API ---
    let mut server = None;
    let mut advert = None;
    if cfg.server.enabled {
        let metrics = Metrics::init(cfg.poll_interval_secs, cfg.debounce.min_interval_secs)?;
        let state = AppState {
            latest: latest.clone(),
            headline_slots: cfg.headline_slots,
        };
        let app = api::router_with_metrics(state, &metrics);
        let addr = cfg.server.socket_addr()?;
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("binding query api on {addr}"))?;
        let port = listener.local_addr()?.port();
        tracing::info!(
            %addr,
            lan_ip = %mdns::lan_ip(),
            "query api listening (GET /news, /news/{{category}}/{{index}})"
        );

        let mut rx = shutdown_rx.clone();
        server = Some(tokio::spawn(async move {
            let stop = async move {
                let _ = rx.wait_for(|stop| *stop).await;
            };
            if let Err(e) = axum::serve(listener, app).with_graceful_shutdown(stop).await {
                tracing::error!(error = %e, "query api stopped with error");
            }
        }));

        advert = mdns::advertise(&cfg.mdns, port)?;
    }

    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("shutdown requested; finishing current cycle");
        let _ = shutdown_tx.send(true);
    });

    let poll = PollLoop {
        cfg: poll_cfg(&cfg),
        sources,
        transport,
        latest,
    };
    let final_state = poll.run(shutdown_rx).await;
    tracing::debug!(?final_state, "final delivery state");

    if let Some(a) = advert {
        a.shutdown();
    }
    if let Some(handle) = server {
        let _ = handle.await;
    }
    tracing::info!("headline relay stopped");
    Ok(())
}
