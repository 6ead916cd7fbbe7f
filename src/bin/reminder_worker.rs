use std::{sync::Arc, time::Duration};

use tokio::signal;
use tracing_subscriber::EnvFilter;

use coursify_backend::{
    auth::jwt::JwtService,
    config::AppConfig,
    db,
    mailer::{Mailer, MailerStack},
    s3::build_client,
    state::AppState,
    storage::S3Storage,
    ReminderWorker,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "reminder-worker",
        database_url = %config.redacted_database_url(),
        pool_size = 1,
        smtp_configured = config.smtp_host.is_some(),
        mail_api_configured = config.mail_api_endpoint.is_some(),
        poll_seconds = config.reminder_poll_seconds,
        "loaded backend configuration"
    );
    let pool = db::init_pool_with_size(&config.database_url, 1)?;
    let s3_client = build_client(&config).await?;
    let storage = Arc::new(S3Storage::new(s3_client, config.s3_bucket.clone()));
    let jwt = JwtService::from_config(&config)?;
    let mailer: Arc<dyn Mailer> = Arc::new(MailerStack::from_config(&config)?);
    let poll_interval = Duration::from_secs(config.reminder_poll_seconds);

    let state = Arc::new(AppState::new(pool, config, storage, jwt, mailer));
    let worker = ReminderWorker::new(state, poll_interval);

    tokio::select! {
        _ = worker.run() => {}
        _ = signal::ctrl_c() => {
            tracing::info!("reminder worker received shutdown signal");
        }
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
