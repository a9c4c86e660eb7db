//! Binance USDT-margined futures REST gateway.

use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;

use crate::domain::{ExchangeId, Symbol};
use crate::error::MarketError;
use crate::port::MarketData;

const DEFAULT_BASE_URL: &str = "https://fapi.binance.com";

/// Delivery/settlement error codes for the open-interest endpoint; the
/// instrument is no longer tradable and must be dropped, not retried.
const INVALID_SYMBOL_CODES: [i64; 2] = [-1121, -4108];

/// "BTC/USDT:USDT" -> "BTCUSDT".
fn native_name(symbol: &Symbol) -> String {
    symbol.as_str().replace(":USDT", "").replace('/', "")
}

#[derive(Debug, Deserialize)]
struct ExchangeInfo {
    symbols: Vec<InstrumentInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstrumentInfo {
    base_asset: String,
    quote_asset: String,
    contract_type: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct TickerPrice {
    symbol: String,
    price: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpenInterestInfo {
    open_interest: String,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: i64,
    msg: String,
}

/// REST client for Binance USDT-perpetual market data.
pub struct BinanceGateway {
    client: Client,
    base_url: String,
}

impl BinanceGateway {
    #[must_use]
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL.to_string())
    }

    #[must_use]
    pub fn with_base_url(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
        }
    }

    fn parse_price(raw: &str) -> Result<Decimal, MarketError> {
        Decimal::from_str(raw)
            .map_err(|_| MarketError::Payload(format!("unparseable decimal: {raw}")))
    }
}

impl Default for BinanceGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketData for BinanceGateway {
    fn exchange(&self) -> ExchangeId {
        ExchangeId::Binance
    }

    async fn list_instruments(&self) -> Result<Vec<Symbol>, MarketError> {
        let url = format!("{}/fapi/v1/exchangeInfo", self.base_url);
        let info: ExchangeInfo = self.client.get(&url).send().await?.json().await?;

        let symbols: Vec<Symbol> = info
            .symbols
            .into_iter()
            .filter(|s| {
                s.contract_type == "PERPETUAL" && s.quote_asset == "USDT" && s.status == "TRADING"
            })
            .map(|s| Symbol::new(format!("{}/USDT:USDT", s.base_asset)))
            .collect();
        debug!(count = symbols.len(), "listed binance perpetuals");
        Ok(symbols)
    }

    async fn batch_fetch_last(
        &self,
        symbols: &[Symbol],
    ) -> Result<HashMap<Symbol, Decimal>, MarketError> {
        let url = format!("{}/fapi/v1/ticker/price", self.base_url);
        let tickers: Vec<TickerPrice> = self.client.get(&url).send().await?.json().await?;

        let by_native: HashMap<String, String> = tickers
            .into_iter()
            .map(|t| (t.symbol, t.price))
            .collect();

        let mut prices = HashMap::new();
        for symbol in symbols {
            if let Some(raw) = by_native.get(&native_name(symbol)) {
                prices.insert(symbol.clone(), Self::parse_price(raw)?);
            }
        }
        Ok(prices)
    }

    async fn fetch_open_interest(&self, symbol: &Symbol) -> Result<Option<Decimal>, MarketError> {
        let url = format!(
            "{}/fapi/v1/openInterest?symbol={}",
            self.base_url,
            native_name(symbol)
        );
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            let body = response.text().await?;
            if let Ok(api_error) = serde_json::from_str::<ApiError>(&body) {
                if INVALID_SYMBOL_CODES.contains(&api_error.code) {
                    return Err(MarketError::Settlement {
                        symbol: symbol.as_str().to_string(),
                    });
                }
                return Err(MarketError::Payload(format!(
                    "binance error {}: {}",
                    api_error.code, api_error.msg
                )));
            }
            return Err(MarketError::Payload(body));
        }

        let info: OpenInterestInfo = response.json().await?;
        Ok(Some(Self::parse_price(&info.open_interest)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_name_strips_unified_decoration() {
        assert_eq!(native_name(&Symbol::new("BTC/USDT:USDT")), "BTCUSDT");
        assert_eq!(native_name(&Symbol::new("1000PEPE/USDT:USDT")), "1000PEPEUSDT");
    }

    #[test]
    fn parse_price_rejects_garbage() {
        assert!(BinanceGateway::parse_price("42000.5").is_ok());
        assert!(BinanceGateway::parse_price("n/a").is_err());
    }
}
