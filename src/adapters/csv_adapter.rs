//! CSV file market data adapter.
//!
//! A data directory holds `instruments.csv` with one line of metadata per
//! pair, and one candle file per pair and granularity named
//! `<SYMBOL>_<GRAN>.csv`.

use chrono::{DateTime, Utc};
use csv::StringRecord;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::domain::candle::Candle;
use crate::domain::config_validation::parse_time;
use crate::domain::error::FxsimError;
use crate::domain::granularity::Granularity;
use crate::domain::instrument::{InstrumentData, InstrumentMeta};
use crate::domain::row::Row;
use crate::domain::timeframe::Timeframe;
use crate::ports::data_port::MarketDataPort;

pub const INSTRUMENTS_FILE: &str = "instruments.csv";

pub struct CsvMarketData {
    base_path: PathBuf,
}

impl CsvMarketData {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn candles_path(&self, symbol: &str, granularity: Granularity) -> PathBuf {
        self.base_path.join(format!("{}_{}.csv", symbol, granularity))
    }

    fn read_records(&self, path: &Path) -> Result<Vec<StringRecord>, FxsimError> {
        let content = fs::read_to_string(path).map_err(|e| FxsimError::Data {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());
        rdr.records()
            .map(|record| {
                record.map_err(|e| FxsimError::Data {
                    reason: format!("CSV parse error in {}: {}", path.display(), e),
                })
            })
            .collect()
    }

    pub fn instrument_metas(&self) -> Result<Vec<InstrumentMeta>, FxsimError> {
        let path = self.base_path.join(INSTRUMENTS_FILE);
        self.read_records(&path)?
            .iter()
            .map(|record| {
                InstrumentMeta::new(
                    &field::<String>(record, 0, "name")?,
                    &field::<String>(record, 1, "type")?,
                    &field::<String>(record, 2, "display_name")?,
                    field(record, 3, "display_precision")?,
                    field(record, 4, "pip_location")?,
                    field(record, 5, "trade_units_precision")?,
                    field(record, 6, "margin_rate")?,
                )
            })
            .collect()
    }

    pub fn instrument_meta(&self, symbol: &str) -> Result<InstrumentMeta, FxsimError> {
        self.instrument_metas()?
            .into_iter()
            .find(|meta| meta.name == symbol)
            .ok_or_else(|| FxsimError::Data {
                reason: format!("instrument {symbol} is not listed in {INSTRUMENTS_FILE}"),
            })
    }

    /// Granularities with a candle file for `symbol`, finest first.
    pub fn available_granularities(&self, symbol: &str) -> Vec<Granularity> {
        Granularity::ALL
            .iter()
            .copied()
            .filter(|g| self.candles_path(symbol, *g).is_file())
            .collect()
    }

    /// Candles for one pair and granularity, optionally bounded to `[from, to]`.
    pub fn read_timeframe(
        &self,
        symbol: &str,
        granularity: Granularity,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Timeframe, FxsimError> {
        let path = self.candles_path(symbol, granularity);
        let mut rows = Vec::new();

        for record in self.read_records(&path)? {
            let row = parse_row(&record)?;
            if from.is_some_and(|from| row.time < from) || to.is_some_and(|to| row.time > to) {
                continue;
            }
            rows.push(row);
        }

        Ok(Timeframe::new(symbol, granularity, rows))
    }
}

impl MarketDataPort for CsvMarketData {
    fn instrument_data(
        &self,
        symbols: &[String],
        granularities: &[Granularity],
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<InstrumentData>, FxsimError> {
        let metas = self.instrument_metas()?;
        let mut instruments = Vec::with_capacity(symbols.len());

        for symbol in symbols {
            let meta = metas
                .iter()
                .find(|meta| &meta.name == symbol)
                .cloned()
                .ok_or_else(|| FxsimError::Data {
                    reason: format!("instrument {symbol} is not listed in {INSTRUMENTS_FILE}"),
                })?;

            let mut data = InstrumentData::new(meta);
            for granularity in granularities {
                let timeframe = self.read_timeframe(symbol, *granularity, Some(from), Some(to))?;
                if timeframe.is_empty() {
                    return Err(FxsimError::NoData {
                        symbol: format!("{symbol} {granularity}"),
                    });
                }
                tracing::debug!("loaded {}", timeframe);
                data.add_timeframe(timeframe)?;
            }
            instruments.push(data);
        }

        Ok(instruments)
    }

    fn list_symbols(&self) -> Result<Vec<String>, FxsimError> {
        let mut symbols: Vec<String> = self
            .instrument_metas()?
            .into_iter()
            .map(|meta| meta.name)
            .collect();
        symbols.sort();
        Ok(symbols)
    }
}

fn field<T>(record: &StringRecord, index: usize, name: &str) -> Result<T, FxsimError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = record.get(index).ok_or_else(|| FxsimError::Data {
        reason: format!("missing {name} column"),
    })?;
    raw.parse().map_err(|e| FxsimError::Data {
        reason: format!("invalid {name} value {raw}: {e}"),
    })
}

fn candle(record: &StringRecord, first: usize, side: &str) -> Result<Candle, FxsimError> {
    let open = field(record, first, &format!("{side}_o"))?;
    let high = field(record, first + 1, &format!("{side}_h"))?;
    let low = field(record, first + 2, &format!("{side}_l"))?;
    let close = field(record, first + 3, &format!("{side}_c"))?;
    Ok(Candle::new(open, close, high, low))
}

fn parse_row(record: &StringRecord) -> Result<Row, FxsimError> {
    let raw_time = record.get(0).ok_or_else(|| FxsimError::Data {
        reason: "missing time column".into(),
    })?;
    let time = parse_time(raw_time).ok_or_else(|| FxsimError::Data {
        reason: format!("invalid time value {raw_time}"),
    })?;

    let complete = match record.get(2).map(str::to_lowercase).as_deref() {
        Some("true") | Some("1") => true,
        Some("false") | Some("0") => false,
        other => {
            return Err(FxsimError::Data {
                reason: format!("invalid complete value {}", other.unwrap_or("")),
            });
        }
    };

    Ok(Row {
        time,
        volume: field(record, 1, "volume")?,
        complete,
        delayed: false,
        ask: candle(record, 3, "ask")?,
        bid: candle(record, 7, "bid")?,
        mid: candle(record, 11, "mid")?,
    })
}
