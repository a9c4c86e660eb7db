//! Market Data Gateway port.

use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::domain::{ExchangeId, Symbol};
use crate::error::MarketError;

/// Read-only access to one exchange's perpetual-futures market data.
///
/// A missing entry in the batch result means "no data this cycle" for that
/// instrument, not an error. Settlement/delisting surfaces structurally as
/// [`MarketError::Settlement`] so callers can drop the instrument instead of
/// guessing from message text.
#[async_trait]
pub trait MarketData: Send + Sync {
    /// Which exchange this gateway serves.
    fn exchange(&self) -> ExchangeId;

    /// Current universe of tradable USDT-perpetual symbols.
    async fn list_instruments(&self) -> Result<Vec<Symbol>, MarketError>;

    /// Latest prices for the requested symbols in one batched call.
    async fn batch_fetch_last(
        &self,
        symbols: &[Symbol],
    ) -> Result<HashMap<Symbol, Decimal>, MarketError>;

    /// Latest open interest for one symbol; `None` when the exchange has no
    /// figure for it this cycle.
    async fn fetch_open_interest(&self, symbol: &Symbol) -> Result<Option<Decimal>, MarketError>;
}
