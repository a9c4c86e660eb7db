//! Bybit linear-perpetual REST gateway (v5 market API).

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

const DEFAULT_BASE_URL: &str = "https://api.bybit.com";

/// Bybit retCodes for symbols that no longer exist (delisted or settling).
const INVALID_SYMBOL_CODES: [i64; 2] = [10001, 110_001];

/// "BTC/USDT:USDT" -> "BTCUSDT".
fn native_name(symbol: &Symbol) -> String {
    symbol.as_str().replace(":USDT", "").replace('/', "")
}

/// Every v5 market response carries this envelope.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<T> {
    ret_code: i64,
    ret_msg: String,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ListResult<T> {
    list: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstrumentInfo {
    base_coin: String,
    quote_coin: String,
    contract_type: String,
    status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ticker {
    symbol: String,
    last_price: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpenInterestPoint {
    open_interest: String,
}

/// REST client for Bybit linear-perpetual market data.
pub struct BybitGateway {
    client: Client,
    base_url: String,
}

impl BybitGateway {
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

    /// Unwrap the v5 envelope, mapping symbol-gone retCodes to settlement.
    fn unwrap_envelope<T>(
        envelope: Envelope<T>,
        symbol: &Symbol,
    ) -> Result<T, MarketError> {
        if envelope.ret_code != 0 {
            if INVALID_SYMBOL_CODES.contains(&envelope.ret_code) {
                return Err(MarketError::Settlement {
                    symbol: symbol.as_str().to_string(),
                });
            }
            return Err(MarketError::Payload(format!(
                "bybit error {}: {}",
                envelope.ret_code, envelope.ret_msg
            )));
        }
        envelope
            .result
            .ok_or_else(|| MarketError::Payload("empty result in bybit response".into()))
    }

    fn parse_price(raw: &str) -> Result<Decimal, MarketError> {
        Decimal::from_str(raw)
            .map_err(|_| MarketError::Payload(format!("unparseable decimal: {raw}")))
    }
}

impl Default for BybitGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketData for BybitGateway {
    fn exchange(&self) -> ExchangeId {
        ExchangeId::Bybit
    }

    async fn list_instruments(&self) -> Result<Vec<Symbol>, MarketError> {
        let url = format!(
            "{}/v5/market/instruments-info?category=linear&limit=1000",
            self.base_url
        );
        let envelope: Envelope<ListResult<InstrumentInfo>> =
            self.client.get(&url).send().await?.json().await?;
        let result = match envelope.ret_code {
            0 => envelope
                .result
                .ok_or_else(|| MarketError::Payload("empty result in bybit response".into()))?,
            code => {
                return Err(MarketError::Payload(format!(
                    "bybit error {code}: {}",
                    envelope.ret_msg
                )))
            }
        };

        let symbols: Vec<Symbol> = result
            .list
            .into_iter()
            .filter(|i| {
                i.contract_type == "LinearPerpetual"
                    && i.quote_coin == "USDT"
                    && i.status == "Trading"
            })
            .map(|i| Symbol::new(format!("{}/USDT:USDT", i.base_coin)))
            .collect();
        debug!(count = symbols.len(), "listed bybit perpetuals");
        Ok(symbols)
    }

    async fn batch_fetch_last(
        &self,
        symbols: &[Symbol],
    ) -> Result<HashMap<Symbol, Decimal>, MarketError> {
        let url = format!("{}/v5/market/tickers?category=linear", self.base_url);
        let envelope: Envelope<ListResult<Ticker>> =
            self.client.get(&url).send().await?.json().await?;
        let result = match envelope.ret_code {
            0 => envelope
                .result
                .ok_or_else(|| MarketError::Payload("empty result in bybit response".into()))?,
            code => {
                return Err(MarketError::Payload(format!(
                    "bybit error {code}: {}",
                    envelope.ret_msg
                )))
            }
        };

        let by_native: HashMap<String, String> = result
            .list
            .into_iter()
            .map(|t| (t.symbol, t.last_price))
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
            "{}/v5/market/open-interest?category=linear&symbol={}&intervalTime=5min&limit=1",
            self.base_url,
            native_name(symbol)
        );
        let envelope: Envelope<ListResult<OpenInterestPoint>> =
            self.client.get(&url).send().await?.json().await?;
        let result = Self::unwrap_envelope(envelope, symbol)?;

        match result.list.first() {
            Some(point) => Ok(Some(Self::parse_price(&point.open_interest)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_maps_symbol_errors_to_settlement() {
        let symbol = Symbol::new("XYZ/USDT:USDT");
        let envelope: Envelope<ListResult<OpenInterestPoint>> = Envelope {
            ret_code: 10001,
            ret_msg: "params error: symbol invalid".into(),
            result: None,
        };
        assert!(matches!(
            BybitGateway::unwrap_envelope(envelope, &symbol),
            Err(MarketError::Settlement { .. })
        ));
    }

    #[test]
    fn envelope_passes_through_payload() {
        let symbol = Symbol::new("BTC/USDT:USDT");
        let envelope: Envelope<ListResult<OpenInterestPoint>> = Envelope {
            ret_code: 0,
            ret_msg: "OK".into(),
            result: Some(ListResult {
                list: vec![OpenInterestPoint {
                    open_interest: "12345.5".into(),
                }],
            }),
        };
        let result = BybitGateway::unwrap_envelope(envelope, &symbol).unwrap();
        assert_eq!(result.list.len(), 1);
    }
}
