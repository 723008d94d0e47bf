use std::net::SocketAddr;
use std::sync::Arc;

use lead_relay_api::{
    config::Config,
    credentials::{load_service_account, ServiceAccountAuthority, SPREADSHEETS_SCOPE},
    gemini::GeminiRelay,
    handlers::AppState,
    prompt::load_system_instruction,
    routes::build_router,
    sheets::GoogleSheetsSink,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the application.
///
/// This function initializes the application, including:
/// - Logging and tracing.
/// - Configuration loading.
/// - Service-account credentials and the Sheets lead sink.
/// - The Gemini chat relay with its system instruction.
/// - HTTP routes and middleware (origin allow-list, CORS, rate limiting,
///   body limit, security headers).
///
/// It then starts the Axum server.
///
/// # Returns
///
/// * `anyhow::Result<()>` - Ok if the server runs successfully, or an error if initialization fails.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lead_relay_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    // Parse service-account credentials up front so a bad blob fails startup
    let service_account =
        load_service_account(Some(config.google_service_account_json.as_str()))?;
    let authority = Arc::new(ServiceAccountAuthority::new(
        &service_account,
        SPREADSHEETS_SCOPE,
    )?);
    tracing::info!("Service account loaded: {}", authority.client_email());

    let sink = GoogleSheetsSink::new(&config, authority)?;
    if config.verify_sheet_header {
        sink.verify_header().await?;
    } else {
        tracing::debug!("Leads header verification disabled");
    }

    let system_instruction =
        load_system_instruction(config.system_instruction_path.as_deref()).await?;
    let relay = GeminiRelay::new(&config, system_instruction)?;
    tracing::info!("✓ Gemini relay initialized: {}", config.gemini_model);

    // Build application state
    let app_state = Arc::new(AppState {
        relay: Arc::new(relay),
        sink: Arc::new(sink),
    });

    let app = build_router(app_state, &config)?;

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
