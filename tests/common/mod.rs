#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use fxsim::domain::candle::Candle;
use fxsim::domain::error::FxsimError;
use fxsim::domain::granularity::Granularity;
use fxsim::domain::instrument::{InstrumentData, InstrumentMeta};
use fxsim::domain::position::{Direction, Lot};
use fxsim::domain::row::Row;
use fxsim::domain::strategy::LadderConfig;
use fxsim::domain::timeframe::Timeframe;
use fxsim::ports::data_port::MarketDataPort;
use std::collections::HashMap;

pub struct MockMarketData {
    pub data: HashMap<String, InstrumentData>,
    pub errors: HashMap<String, String>,
}

impl MockMarketData {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_instrument(mut self, data: InstrumentData) -> Self {
        self.data.insert(data.name().to_string(), data);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl MarketDataPort for MockMarketData {
    fn instrument_data(
        &self,
        symbols: &[String],
        _granularities: &[Granularity],
        _from: DateTime<Utc>,
        _to: DateTime<Utc>,
    ) -> Result<Vec<InstrumentData>, FxsimError> {
        symbols
            .iter()
            .map(|symbol| {
                if let Some(reason) = self.errors.get(symbol) {
                    return Err(FxsimError::Data {
                        reason: reason.clone(),
                    });
                }
                self.data
                    .get(symbol)
                    .cloned()
                    .ok_or_else(|| FxsimError::NoData {
                        symbol: symbol.clone(),
                    })
            })
            .collect()
    }

    fn list_symbols(&self) -> Result<Vec<String>, FxsimError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }
}

/// 2024-04-01 09:00 UTC plus `minute` minutes.
pub fn t(minute: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 4, 1, 9, 0, 0).unwrap() + Duration::minutes(minute)
}

pub fn meta(symbol: &str) -> InstrumentMeta {
    let display = symbol.replace('_', "/");
    InstrumentMeta::new(symbol, "CURRENCY", &display, 5, -4, 0, 0.02).unwrap()
}

pub fn flat(price: f64) -> Candle {
    Candle::new(price, price, price, price)
}

pub fn make_row(minute: i64, bid: Candle, ask: Candle) -> Row {
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

/// Flat quote with a 2 pip spread above `bid`.
pub fn make_quote(minute: i64, bid: f64) -> Row {
    make_row(minute, flat(bid), flat(bid + 0.0002))
}

/// One M1 quote per minute in `minutes`, all at the same bid.
pub fn generate_quotes(minutes: std::ops::RangeInclusive<i64>, bid: f64) -> Vec<Row> {
    minutes.map(|m| make_quote(m, bid)).collect()
}

/// `symbol` with a single M1 timeframe made of `rows`.
pub fn make_instrument(symbol: &str, rows: Vec<Row>) -> InstrumentData {
    let mut data = InstrumentData::new(meta(symbol));
    data.add_timeframe(Timeframe::new(symbol, Granularity::M1, rows))
        .unwrap();
    data
}

pub fn short_micro_ladder(max_running: usize) -> LadderConfig {
    LadderConfig {
        instrument: "EUR_USD".to_string(),
        lot: Lot::Micro,
        count: 1,
        direction: Direction::Short,
        take_profit: Some(0.0050),
        stop_loss: Some(0.0050),
        max_running,
    }
}
