mod routes;
mod singleton;
mod smtp;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use roombook_core::config::{Config, Vendor};
use roombook_core::coordinator::BookingCoordinator;
use roombook_core::provider::{CalendarProvider, DisabledProvider};
use roombook_core::status::SyncStatusReporter;
use roombook_core::store::MeetingStore;
use roombook_provider_google::GoogleCalendarProvider;
use roombook_provider_outlook::OutlookCalendarProvider;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::smtp::SmtpNotifier;
use crate::state::AppState;

const DEFAULT_PORT: u16 = 4141;

fn config_path() -> Result<PathBuf> {
    match std::env::var_os("ROOMBOOK_CONFIG") {
        Some(path) => Ok(PathBuf::from(path)),
        None => Ok(Config::default_path()?),
    }
}

/// Build the configured vendor adapter. A misconfigured provider does not
/// take the process down: booking calls report the problem and the status
/// endpoint stays up to explain it.
fn build_provider(config: &Config) -> Arc<dyn CalendarProvider> {
    let provider = config.provider.clone();
    let vendor = provider.vendor;

    let built: Result<Arc<dyn CalendarProvider>, _> = match vendor {
        Vendor::Google => {
            GoogleCalendarProvider::new(provider).map(|p| Arc::new(p) as Arc<dyn CalendarProvider>)
        }
        Vendor::Outlook => {
            OutlookCalendarProvider::new(provider).map(|p| Arc::new(p) as Arc<dyn CalendarProvider>)
        }
    };

    match built {
        Ok(provider) => provider,
        Err(e) => {
            error!(%vendor, error = %e, "provider disabled by configuration error");
            Arc::new(DisabledProvider::new(vendor, e.to_string()))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // Two servers over one snapshot would double-book rooms.
    let _lock = singleton::InstanceLock::acquire()?;

    let config = Config::load(&config_path()?)?;

    let store = Arc::new(MeetingStore::open(config.store_path()?)?);
    let provider = build_provider(&config);
    let notifier = Arc::new(SmtpNotifier::new(config.smtp.clone()));

    let coordinator = Arc::new(BookingCoordinator::new(
        store.clone(),
        provider,
        notifier.clone(),
        config.smtp.admin_to.clone(),
        config.smtp.base_url.clone(),
    ));
    let reporter = Arc::new(SyncStatusReporter::new(
        config.provider.clone(),
        notifier,
        store.clone(),
    ));

    let state = AppState {
        coordinator,
        reporter,
        store,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .merge(routes::meetings::router())
        .merge(routes::cancel::router())
        .merge(routes::status::router())
        .with_state(state)
        .layer(cors);

    let addr = SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT));
    info!(%addr, "roombook-server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
