use community_bot::{ AppError, Config, Result };
use community_bot::bot::BotState;
use community_bot::db::MemberRepository;
use community_bot::services::{ GasService, PriceService };
use community_bot::verification::{ TelegramTransport, VerificationController, VerificationSettings };
use migration::MigratorTrait;
use std::sync::Arc;
use teloxide::Bot;
use tracing_subscriber::{ layer::SubscriberExt, util::SubscriberInitExt };

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber
        ::registry()
        .with(
            tracing_subscriber::EnvFilter
                ::try_from_default_env()
                .unwrap_or_else(|_| "community_bot=debug,tower_http=debug".into())
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env().map_err(|e| AppError::Config(e.to_string()))?;

    tracing::info!(
        "Starting community-bot for {} with {} challenges ({}s timeout)",
        config.community_name,
        config.challenge_mode,
        config.verification_timeout.as_secs()
    );

    // Initialize database connection
    let db = sea_orm::Database::connect(&config.database_url).await.map_err(AppError::Database)?;

    tracing::info!("Database connected successfully");

    if config.run_migrations {
        migration::Migrator::up(&db, None).await.map_err(AppError::Database)?;
        tracing::info!("Migrations completed successfully");
    }

    let bot = Bot::new(&config.telegram_bot_token);

    let directory = Arc::new(MemberRepository::new(db));
    let transport = Arc::new(TelegramTransport::new(bot.clone()));

    let verification = VerificationController::new(
        transport.clone(),
        directory,
        VerificationSettings::from(&config)
    );

    if !config.gas_enabled() {
        tracing::warn!("ETHERSCAN_API_KEY not set, /gas is disabled");
    }

    let price_service = Arc::new(PriceService::new()?);
    let gas_service = Arc::new(GasService::new(config.etherscan_api_key.clone())?);

    let config = Arc::new(config);

    // Ops HTTP server
    let app = community_bot::api::router(community_bot::api::AppState::new(verification.clone()));
    let addr = config.server_addr();
    let listener = tokio::net::TcpListener
        ::bind(&addr).await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    tracing::info!("Server listening on {}", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("HTTP server stopped: {}", e);
        }
    });

    let state = Arc::new(BotState {
        verification,
        transport,
        price_service,
        gas_service,
        config,
    });

    community_bot::bot::run_bot(bot, state).await;

    tracing::info!("Bot stopped");
    Ok(())
}
