//! Fixture builders shared by the domain unit tests.

use chrono::{DateTime, Duration, TimeZone, Utc};

use super::candle::Candle;
use super::context::Context;
use super::granularity::Granularity;
use super::instrument::{InstrumentData, InstrumentMeta};
use super::row::Row;
use super::timeframe::Timeframe;

/// 2024-04-01 09:00 UTC plus `minute` minutes.
pub fn t(minute: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 4, 1, 9, 0, 0).unwrap() + Duration::minutes(minute)
}

pub fn eur_usd_meta() -> InstrumentMeta {
    InstrumentMeta::new("EUR_USD", "CURRENCY", "EUR/USD", 5, -4, 0, 0.02).unwrap()
}

pub fn flat(price: f64) -> Candle {
    Candle::new(price, price, price, price)
}

pub fn bar(open: f64, close: f64, high: f64, low: f64) -> Candle {
    Candle::new(open, close, high, low)
}

pub fn quote(minute: i64, bid: Candle, ask: Candle) -> Row {
    Row {
        time: t(minute),
        volume: 100,
        complete: true,
        delayed: false,
        ask,
        bid,
        mid: Candle::new(
            (bid.open + ask.open) / 2.0,
            (bid.close + ask.close) / 2.0,
            (bid.high + ask.high) / 2.0,
            (bid.low + ask.low) / 2.0,
        ),
    }
}

/// EUR_USD with a single M1 timeframe made of `rows`.
pub fn instrument(rows: Vec<Row>) -> InstrumentData {
    let mut data = InstrumentData::new(eur_usd_meta());
    data.add_timeframe(Timeframe::new("EUR_USD", Granularity::M1, rows))
        .unwrap();
    data
}

pub fn context_at(data: &InstrumentData, minute: i64) -> Context<'_> {
    let mut context = Context::new(t(minute));
    context.add_instrument(data).unwrap();
    context
}
