use std::sync::Arc;

use millgate::approvers::ApproverResolver;
use millgate::config;
use millgate::directory::{DirectoryStore, MemoryDirectoryStore, PgDirectoryStore};
use millgate::notify::{LogNotifier, Notifier, SmtpNotifier};
use millgate::registration::RegistrationService;
use millgate::session::SessionService;
use millgate::AppState;

#[tokio::main]
async fn main() {
    // Load .env if present so cargo run picks up DATABASE_URL, SMTP_*, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    let config = config::config();
    tracing::info!("Starting Millgate in {:?} mode", config.environment);

    // Postgres when DATABASE_URL is set; otherwise an ephemeral in-memory
    // store for database-less development.
    let directory: Arc<dyn DirectoryStore> = if std::env::var("DATABASE_URL").is_ok() {
        let store = PgDirectoryStore::connect()
            .await
            .unwrap_or_else(|e| panic!("failed to connect directory store: {}", e));
        Arc::new(store)
    } else {
        tracing::warn!("DATABASE_URL not set; using in-memory directory store (state is ephemeral)");
        Arc::new(MemoryDirectoryStore::new())
    };

    let notifier: Arc<dyn Notifier> = if config.mail.from_address.is_empty() {
        tracing::warn!("SMTP_FROM not set; approval mail will be logged, not delivered");
        Arc::new(LogNotifier)
    } else {
        let smtp = SmtpNotifier::new(&config.mail)
            .unwrap_or_else(|e| panic!("failed to build SMTP notifier: {}", e));
        Arc::new(smtp)
    };

    let resolver = ApproverResolver::new(&config.approvers);
    let state = AppState {
        registration: Arc::new(RegistrationService::new(
            directory.clone(),
            notifier,
            resolver,
            config.otp.clone(),
        )),
        sessions: Arc::new(SessionService::new(directory.clone(), &config.session)),
        directory,
    };

    let app = millgate::app(state);

    // Allow tests or deployments to override port via env
    let port = std::env::var("MILLGATE_PORT")
        .ok()
        .or_else(|| std::env::var("PORT").ok())
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(9000);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {}: {}", bind_addr, e));

    tracing::info!("Millgate server listening on http://{}", bind_addr);

    axum::serve(listener, app).await.expect("server");
}
