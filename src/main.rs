use std::sync::Arc;
use std::sync::atomic::Ordering;

use code_relay::config::Config;
use code_relay::gmail::{GmailClient, OauthClient};
use code_relay::http::{AppState, routes};
use code_relay::scheduler::{SchedulerDeps, spawn_scheduler};
use code_relay::store::{AccountStore, SqliteStore};
use code_relay::telegram::{Bot, Notifier, TelegramApi};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = Config::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  required: TELEGRAM_BOT_TOKEN, GOOGLE_CLIENT_ID,");
        eprintln!("            GOOGLE_CLIENT_SECRET, RELAY_PUBLIC_URL");
        std::process::exit(1);
    });

    eprintln!("📬 Code Relay v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   OAuth callback: {}", config.redirect_uri());
    eprintln!("   HTTP: http://0.0.0.0:{}", config.http_port);
    eprintln!("   Poll interval: {}s", config.poll_interval.as_secs());

    // ── Store ───────────────────────────────────────────────────────
    let store: Arc<dyn AccountStore> =
        Arc::new(SqliteStore::open(&config.db_path).unwrap_or_else(|e| {
            eprintln!("Error: Failed to open database at {}: {e}", config.db_path);
            std::process::exit(1);
        }));
    eprintln!("   Database: {}", config.db_path);

    // ── Collaborators ───────────────────────────────────────────────
    let http_client = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .build()?;
    // The bot's getUpdates long-poll holds connections open for 30s.
    let long_poll_client = reqwest::Client::builder()
        .timeout(config.request_timeout + std::time::Duration::from_secs(30))
        .build()?;

    let oauth = Arc::new(OauthClient::new(&config, http_client.clone()));
    let gmail = Arc::new(GmailClient::new(Arc::clone(&oauth), http_client.clone()));
    let telegram = Arc::new(TelegramApi::new(
        config.telegram_bot_token.clone(),
        long_poll_client,
    ));

    // ── HTTP server (OAuth callback + health) ───────────────────────
    let app = routes(AppState {
        store: Arc::clone(&store),
        oauth: Arc::clone(&oauth),
        gmail: Arc::clone(&gmail),
        telegram: Arc::clone(&telegram),
    });
    let http_port = config.http_port;
    tokio::spawn(async move {
        let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{http_port}"))
            .await
            .expect("Failed to bind HTTP port");
        tracing::info!(port = http_port, "HTTP server started");
        axum::serve(listener, app).await.ok();
    });

    // ── Telegram bot ────────────────────────────────────────────────
    let bot = Bot::new(
        Arc::clone(&telegram),
        Arc::clone(&store),
        Arc::clone(&gmail) as Arc<dyn code_relay::gmail::MailAccess>,
        Arc::clone(&oauth),
        config.poll_interval,
    );
    let (bot_handle, bot_shutdown) = bot.spawn();

    // ── Polling scheduler ───────────────────────────────────────────
    let (poll_handle, poll_shutdown) = spawn_scheduler(
        config.poll_interval,
        config.first_poll_delay,
        config.fetch_limit,
        SchedulerDeps {
            store: Arc::clone(&store),
            mail: Arc::clone(&gmail) as Arc<dyn code_relay::gmail::MailAccess>,
            notifier: Arc::clone(&telegram) as Arc<dyn Notifier>,
        },
    );

    eprintln!("   Bot and poller running. Ctrl-C to stop.\n");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    bot_shutdown.store(true, Ordering::Relaxed);
    poll_shutdown.store(true, Ordering::Relaxed);
    bot_handle.abort();
    poll_handle.abort();

    Ok(())
}
