use std::sync::Arc;

use teloxide::Bot;

use tgrelay_core::{
    config::Config,
    gateway::{GatewayServer, GatewayState},
    media::MediaStore,
    media_server::MediaServer,
    platform::PlatformPort,
    relay::EventRelay,
    supervisor::Supervisor,
    webhook::WebhookDispatcher,
};
use tgrelay_telegram::{events::run_events, TelegramPlatform};

#[tokio::main]
async fn main() -> Result<(), tgrelay_core::Error> {
    tgrelay_core::logging::init("tgrelay")?;

    let cfg = Arc::new(Config::load()?);

    let bot = Bot::new(cfg.telegram_bot_token.clone());
    let platform: Arc<dyn PlatformPort> = Arc::new(TelegramPlatform::new(bot.clone()));
    let store = Arc::new(MediaStore::new(cfg.media_dir.clone())?);
    let dispatcher = Arc::new(WebhookDispatcher::new(
        cfg.webhook_url.clone(),
        cfg.webhook_api_key.clone(),
        cfg.webhook_timeout,
    )?);
    let relay = Arc::new(EventRelay::new(
        platform.clone(),
        store.clone(),
        dispatcher,
        cfg.public_media_base(),
    ));

    // The session must be live before the relay or gateway can issue any
    // platform operation.
    let supervisor = Supervisor::new(platform.clone());
    supervisor.start().await?;

    let media_server =
        MediaServer::start(&cfg.bind_host, cfg.public_media_port, store.dir().to_path_buf())
            .await?;
    let gateway = GatewayServer::start(
        &cfg.bind_host,
        cfg.api_port,
        GatewayState {
            platform: platform.clone(),
            api_token: cfg.api_token.clone(),
        },
    )
    .await?;
    let _sweeper = store.spawn_sweeper(
        cfg.sweep_interval,
        cfg.media_retention,
        supervisor.shutdown_token(),
    );

    let events = tokio::spawn(run_events(bot, relay, supervisor.shutdown_token()));

    supervisor.wait_for_shutdown().await;
    supervisor.stop().await;

    gateway.shutdown();
    media_server.shutdown();
    let _ = events.await;

    Ok(())
}
