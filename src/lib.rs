//! Pumpwatch - pump, dump, and open-interest alerts for perpetual futures.
//!
//! Polls Binance and Bybit USDT-perpetual markets once a minute, keeps a
//! sliding window of recent observations per instrument, and evaluates every
//! subscriber's thresholds against it. Fired alerts are delivered over
//! Telegram through a rate-limited dispatcher that honors the gateway's
//! flood control.
//!
//! # Modules
//!
//! - [`config`] - Configuration loading from TOML files and the environment
//! - [`domain`] - Windows, detection rules, signals, and the alert gate
//! - [`port`] - Traits the engine depends on: market data, delivery, clock
//! - [`adapter`] - Exchange gateways and the Telegram messenger
//! - [`app`] - The cycle engine and the delivery dispatcher
//! - [`error`] - Error types for the crate
//!
//! # Features
//!
//! - `telegram` (default) - Telegram delivery via teloxide

pub mod adapter;
pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod port;
