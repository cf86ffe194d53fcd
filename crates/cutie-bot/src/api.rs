use std::sync::{Arc, Mutex};

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use cutie_store::Database;
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::commands::Permissions;
use crate::config::BotConfig;
use crate::discord::Platform;
use crate::dispatch;
use crate::error::{CommandError, ServerError};
use crate::interaction::{Interaction, InteractionResponse};
use crate::style::StyleBook;
use crate::verify::InteractionVerifier;

const SIGNATURE_HEADER: &str = "x-signature-ed25519";
const TIMESTAMP_HEADER: &str = "x-signature-timestamp";

#[derive(Clone)]
pub struct AppState {
    /// The one ledger connection; every command goes through this lock.
    pub ledger: Arc<Mutex<Database>>,
    pub styles: Arc<StyleBook>,
    pub config: Arc<BotConfig>,
    pub permissions: Permissions,
    pub platform: Arc<dyn Platform>,
    pub verifier: Arc<InteractionVerifier>,
}

impl AppState {
    pub fn new(
        config: BotConfig,
        ledger: Database,
        styles: StyleBook,
        platform: Arc<dyn Platform>,
        verifier: InteractionVerifier,
    ) -> Self {
        Self {
            ledger: Arc::new(Mutex::new(ledger)),
            styles: Arc::new(styles),
            permissions: Permissions::from_config(&config),
            config: Arc::new(config),
            platform,
            verifier: Arc::new(verifier),
        }
    }

    /// Run `f` against the ledger.  The lock is released before returning,
    /// so callers may `.await` afterwards.
    pub fn with_ledger<T, F>(&self, f: F) -> Result<T, CommandError>
    where
        F: FnOnce(&Database) -> Result<T, CommandError>,
    {
        let guard = self
            .ledger
            .lock()
            .map_err(|e| CommandError::Internal(format!("Lock poisoned: {e}")))?;
        f(&*guard)
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/interactions", post(interactions))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    accounts: u64,
}

async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>, ServerError> {
    let accounts = state
        .with_ledger(|db| Ok(db.account_count()?))
        .map_err(|e| ServerError::Internal(e.to_string()))?;

    Ok(Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        accounts,
    }))
}

async fn interactions(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<InteractionResponse>, ServerError> {
    let signature = header(&headers, SIGNATURE_HEADER)?;
    let timestamp = header(&headers, TIMESTAMP_HEADER)?;

    state
        .verifier
        .verify(signature, timestamp, &body)
        .map_err(|e| {
            debug!(error = %e, "rejected interaction");
            ServerError::InvalidSignature
        })?;

    let interaction: Interaction = serde_json::from_slice(&body)
        .map_err(|e| ServerError::BadRequest(format!("Malformed interaction: {e}")))?;

    debug!(id = %interaction.id, kind = interaction.kind, "interaction received");

    let response = dispatch::dispatch(&state, &interaction).await?;
    Ok(Json(response))
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, ServerError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or(ServerError::InvalidSignature)
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting interactions endpoint");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
