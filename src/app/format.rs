//! Message rendering for subscriber alerts and operator summaries.
//!
//! Alerts are HTML with a TradingView hyperlink; operator traffic is plain
//! text.

use rust_decimal::Decimal;

use crate::domain::{ExchangeId, FiredAlert, OiDirection, Signal, SubscriberId};

fn exchange_emoji(exchange: ExchangeId) -> &'static str {
    match exchange {
        ExchangeId::Binance => "\u{1F48E}", // 💎
        ExchangeId::Bybit => "\u{1F319}",   // 🌙
    }
}

/// "BTC/USDT:USDT" -> ("BTCUSDT", "BTC"): the raw symbol for URLs and the
/// short display name.
fn symbol_parts(symbol: &str) -> (String, String) {
    let raw = symbol.replace(":USDT", "").replace('/', "");
    let display = raw.replace("USDT", "");
    (raw, display)
}

fn tradingview_url(exchange: ExchangeId, raw_symbol: &str) -> String {
    format!(
        "https://www.tradingview.com/chart/?symbol={}%3A{}.P",
        exchange.as_str().to_uppercase(),
        raw_symbol
    )
}

/// Trim trailing zeros so 0.05000000 renders as 0.05.
fn format_value(value: Decimal) -> String {
    let s = format!("{value:.8}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    s.to_string()
}

/// Render one fired alert as the subscriber-facing HTML message.
pub fn render_alert(alert: &FiredAlert) -> String {
    let exchange = alert.instrument.exchange;
    let emoji = exchange_emoji(exchange);
    let (raw, display) = symbol_parts(alert.instrument.symbol.as_str());
    let url = tradingview_url(exchange, &raw);
    let hyperlink = format!("<a href=\"{url}\">{display}</a>");

    let (value_kind, signal_name, change, old, new, lookback) = match &alert.signal {
        Signal::Pump {
            change_percent,
            lookback,
            old,
            new,
        } => ("Price", "Pump Signal", change_percent, old, new, lookback),
        Signal::Dump {
            change_percent,
            lookback,
            old,
            new,
        } => ("Price", "Dump Signal", change_percent, old, new, lookback),
        Signal::OpenInterest {
            direction,
            change_percent,
            lookback,
            old,
            new,
        } => {
            let name = match direction {
                OiDirection::Increase => "Increase",
                OiDirection::Decrease => "Decrease",
            };
            ("OI", name, change_percent, old, new, lookback)
        }
    };

    let exchange_name = {
        let mut name = exchange.as_str().to_string();
        name[..1].make_ascii_uppercase();
        name
    };

    format!(
        "{emoji} <b>{hyperlink}</b> | {value_kind} {signal_name}\n\
         {emoji} {exchange_name} | {lookback} min\n\
         {value_kind} Change: <b>{change_abs:.2}%</b>\n\
         {old} -> <b>{new}</b>\n\
         \u{1F507} Alert Number: <b>{number}</b>",
        change_abs = change.abs(),
        old = format_value(*old),
        new = format_value(*new),
        number = alert.alert_number,
    )
}

/// Per-cycle operator stats line.
pub fn render_cycle_summary(
    started: &str,
    finished: &str,
    fetched: &[(ExchangeId, usize)],
    queued: usize,
    sent: usize,
    active_subscribers: usize,
) -> String {
    let fetched_line = fetched
        .iter()
        .map(|(ex, n)| format!("{}: {n}", capitalize(ex.as_str())))
        .collect::<Vec<_>>()
        .join(" | ");
    format!(
        "{started} -> {finished} - Data collected\n\
         Prices: {fetched_line}\n\
         Queued: {queued} | Sent: {sent}\n\
         Active Users: {active_subscribers}"
    )
}

/// Reinitialization summary for the operator.
pub fn render_reinit_summary(
    started: &str,
    finished: &str,
    fetched: usize,
    skipped: usize,
    ignored: usize,
) -> String {
    format!(
        "{started} -> {finished} - Re-initialization done\n\
         {fetched} Fetched. {skipped} Skipped. {ignored} Ignored"
    )
}

/// One digest for every recipient that blocked the bot this cycle.
pub fn render_blocked_digest(blocked: &[SubscriberId]) -> String {
    let ids = blocked
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    format!("The following users have blocked the bot:\n{ids}")
}

/// Digest of fetch errors collected during one cycle.
pub fn render_error_digest(errors: &[String]) -> String {
    format!(
        "The following errors occurred during price fetching:\n{}",
        errors.join("\n")
    )
}

fn capitalize(s: &str) -> String {
    let mut out = s.to_string();
    if !out.is_empty() {
        out[..1].make_ascii_uppercase();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::InstrumentKey;
    use rust_decimal_macros::dec;

    fn pump_alert() -> FiredAlert {
        FiredAlert {
            instrument: InstrumentKey::new(ExchangeId::Binance, "BTC/USDT:USDT"),
            signal: Signal::Pump {
                change_percent: dec!(10.5),
                lookback: 3,
                old: dec!(100),
                new: dec!(110.50000000),
            },
            alert_number: 4,
        }
    }

    #[test]
    fn alert_contains_link_change_and_number() {
        let text = render_alert(&pump_alert());
        assert!(text.contains("tradingview.com/chart/?symbol=BINANCE%3ABTCUSDT.P"));
        assert!(text.contains(">BTC</a>"));
        assert!(text.contains("Price Pump Signal"));
        assert!(text.contains("Binance | 3 min"));
        assert!(text.contains("10.50%"));
        assert!(text.contains("100 -> <b>110.5</b>"));
        assert!(text.contains("Alert Number: <b>4</b>"));
    }

    #[test]
    fn dump_change_renders_as_magnitude() {
        let alert = FiredAlert {
            instrument: InstrumentKey::new(ExchangeId::Bybit, "ETH/USDT:USDT"),
            signal: Signal::Dump {
                change_percent: dec!(-8.25),
                lookback: 2,
                old: dec!(2000),
                new: dec!(1835),
            },
            alert_number: 1,
        };
        let text = render_alert(&alert);
        assert!(text.contains("8.25%"));
        assert!(!text.contains("-8.25"));
        assert!(text.contains("Bybit | 2 min"));
    }

    #[test]
    fn oi_alert_names_direction() {
        let alert = FiredAlert {
            instrument: InstrumentKey::new(ExchangeId::Binance, "SOL/USDT:USDT"),
            signal: Signal::OpenInterest {
                direction: OiDirection::Decrease,
                change_percent: dec!(-12),
                lookback: 5,
                old: dec!(900000),
                new: dec!(792000),
            },
            alert_number: 2,
        };
        let text = render_alert(&alert);
        assert!(text.contains("OI Decrease"));
        assert!(text.contains("OI Change: <b>12.00%</b>"));
    }

    #[test]
    fn trailing_zeros_trimmed_from_values() {
        assert_eq!(format_value(dec!(0.05000000)), "0.05");
        assert_eq!(format_value(dec!(42)), "42");
        assert_eq!(format_value(dec!(0.00012300)), "0.000123");
    }

    #[test]
    fn blocked_digest_lists_ids() {
        let text =
            render_blocked_digest(&[SubscriberId::new(1), SubscriberId::new(2)]);
        assert!(text.contains("1, 2"));
    }
}
