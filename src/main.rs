use std::sync::Arc;

use tokio::signal;
use tracing::{error, info, warn};

use pumpwatch::adapter::{BinanceGateway, BybitGateway, MemorySubscriberStore};
use pumpwatch::app::Engine;
use pumpwatch::config::Config;
use pumpwatch::domain::{
    parse_setting, ExchangeId, SettingField, SubscriberId, SubscriberSettings,
};
use pumpwatch::port::{MarketData, Messenger, SystemClock};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let config = match Config::load("config.toml") {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {e}");
            std::process::exit(1);
        }
    };

    config.init_logging();
    info!("pumpwatch starting");

    let markets: Vec<Arc<dyn MarketData>> = config
        .engine
        .exchanges
        .iter()
        .map(|exchange| match exchange {
            ExchangeId::Binance => Arc::new(BinanceGateway::new()) as Arc<dyn MarketData>,
            ExchangeId::Bybit => Arc::new(BybitGateway::new()) as Arc<dyn MarketData>,
        })
        .collect();

    let store = Arc::new(MemorySubscriberStore::new());
    for entry in &config.subscribers {
        let mut settings = SubscriberSettings::with_defaults(SubscriberId::new(entry.chat_id));
        if let Some(raw) = &entry.alert_limit {
            match parse_setting(SettingField::AlertLimit, raw) {
                Ok(change) => settings.apply(change),
                Err(e) => warn!(chat_id = entry.chat_id, error = %e, "ignoring alert_limit"),
            }
        }
        store.upsert(settings);
    }
    info!(subscribers = config.subscribers.len(), "subscriber store seeded");

    let messenger = match build_messenger(&config) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    let engine = Engine::new(
        config.engine.clone(),
        config.delivery.clone(),
        markets,
        store,
        messenger,
        Arc::new(SystemClock),
    );

    tokio::select! {
        result = engine.run() => {
            if let Err(e) = result {
                error!(error = %e, "Fatal error");
                std::process::exit(1);
            }
        }
        _ = signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    info!("pumpwatch stopped");
}

#[cfg(feature = "telegram")]
fn build_messenger(config: &Config) -> Result<Arc<dyn Messenger>, String> {
    let token = config
        .telegram
        .bot_token
        .as_deref()
        .ok_or("TELEGRAM_BOT_TOKEN is not set")?;
    Ok(Arc::new(pumpwatch::adapter::TelegramMessenger::new(
        token,
        config.telegram.operator_chat_id,
    )))
}

#[cfg(not(feature = "telegram"))]
fn build_messenger(_config: &Config) -> Result<Arc<dyn Messenger>, String> {
    Err("built without the `telegram` feature; no delivery backend available".into())
}
