//! Leveraged position lifecycle.
//!
//! A position is opened running and closes exactly once, either on an
//! explicit user request or when a refresh finds a margin call, stop-loss or
//! take-profit condition. Closed positions reject any further refresh/close.

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

use super::candle::Candle;
use super::context::Context;
use super::currency::Currency;
use super::error::SimError;
use super::instrument::InstrumentMeta;
use super::instrument_context::InstrumentContext;
use super::row::Row;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }

    pub fn opposite(&self) -> Direction {
        match self {
            Direction::Long => Direction::Short,
            Direction::Short => Direction::Long,
        }
    }

    /// Side a position in this direction opens against: longs buy at ask, shorts sell at bid.
    fn open_candle(&self, row: &Row) -> Candle {
        match self {
            Direction::Long => row.ask,
            Direction::Short => row.bid,
        }
    }

    fn close_candle(&self, row: &Row) -> Candle {
        self.opposite().open_candle(row)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => f.write_str("LONG"),
            Direction::Short => f.write_str("SHORT"),
        }
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "LONG" => Ok(Direction::Long),
            "SHORT" => Ok(Direction::Short),
            other => Err(format!("unknown direction {other}, expected LONG or SHORT")),
        }
    }
}

/// Standard position sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lot {
    Standard,
    Mini,
    Micro,
}

impl Lot {
    pub fn units(&self) -> u32 {
        match self {
            Lot::Standard => 100_000,
            Lot::Mini => 10_000,
            Lot::Micro => 1_000,
        }
    }

    /// count x units x margin rate, in the instrument's base currency.
    pub fn margin(&self, meta: &InstrumentMeta, count: u32) -> f64 {
        meta.base_currency()
            .round(f64::from(count) * f64::from(self.units()) * meta.margin_rate)
    }
}

impl fmt::Display for Lot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lot::Standard => f.write_str("STANDARD"),
            Lot::Mini => f.write_str("MINI"),
            Lot::Micro => f.write_str("MICRO"),
        }
    }
}

impl FromStr for Lot {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "STANDARD" => Ok(Lot::Standard),
            "MINI" => Ok(Lot::Mini),
            "MICRO" => Ok(Lot::Micro),
            other => Err(format!(
                "unknown lot {other}, expected STANDARD, MINI or MICRO"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloseType {
    Margin,
    TakeProfit,
    StopLoss,
    User,
}

impl fmt::Display for CloseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseType::Margin => f.write_str("margin"),
            CloseType::TakeProfit => f.write_str("take_profit"),
            CloseType::StopLoss => f.write_str("stop_loss"),
            CloseType::User => f.write_str("user"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PositionId(pub u64);

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Side effect run on every refresh after the close price is updated,
/// before closure conditions are checked. Typically used for trailing stops.
pub type RefreshHandler = Box<dyn FnMut(&mut Position, &Context<'_>)>;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Status {
    Running,
    Closed {
        time: DateTime<Utc>,
        reason: CloseType,
    },
}

pub struct Position {
    id: PositionId,
    instrument: InstrumentMeta,
    lot: Lot,
    count: u32,
    amount: f64,
    margin: f64,
    direction: Direction,
    take_profit: Option<f64>,
    stop_loss: Option<f64>,
    price_open: Candle,
    price_close: Candle,
    time_open: DateTime<Utc>,
    status: Status,
    handlers: Vec<RefreshHandler>,
}

impl Position {
    /// Open against the instrument's current price. `take_profit` and
    /// `stop_loss` are unit-price distances from the open mean.
    pub fn open(
        id: PositionId,
        instrument: &InstrumentContext<'_>,
        lot: Lot,
        count: u32,
        direction: Direction,
        take_profit: Option<f64>,
        stop_loss: Option<f64>,
    ) -> Result<Self, SimError> {
        let price = instrument.price()?;
        let meta = instrument.meta();
        Ok(Position {
            id,
            instrument: meta.clone(),
            lot,
            count,
            amount: f64::from(count) * f64::from(lot.units()),
            margin: lot.margin(meta, count),
            direction,
            take_profit,
            stop_loss,
            price_open: direction.open_candle(price),
            price_close: direction.close_candle(price),
            time_open: instrument.time(),
            status: Status::Running,
            handlers: Vec::new(),
        })
    }

    pub fn id(&self) -> PositionId {
        self.id
    }

    pub fn instrument(&self) -> &InstrumentMeta {
        &self.instrument
    }

    pub fn base_currency(&self) -> Currency {
        self.instrument.base_currency()
    }

    pub fn lot(&self) -> Lot {
        self.lot
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Units traded: lot units x count.
    pub fn amount(&self) -> f64 {
        self.amount
    }

    pub fn margin(&self) -> f64 {
        self.margin
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn take_profit(&self) -> Option<f64> {
        self.take_profit
    }

    pub fn set_take_profit(&mut self, take_profit: Option<f64>) {
        self.take_profit = take_profit;
    }

    pub fn stop_loss(&self) -> Option<f64> {
        self.stop_loss
    }

    pub fn set_stop_loss(&mut self, stop_loss: Option<f64>) {
        self.stop_loss = stop_loss;
    }

    pub fn price_open(&self) -> &Candle {
        &self.price_open
    }

    pub fn price_close(&self) -> &Candle {
        &self.price_close
    }

    pub fn time_open(&self) -> DateTime<Utc> {
        self.time_open
    }

    pub fn time_close(&self) -> Option<DateTime<Utc>> {
        match self.status {
            Status::Running => None,
            Status::Closed { time, .. } => Some(time),
        }
    }

    pub fn close_type(&self) -> Option<CloseType> {
        match self.status {
            Status::Running => None,
            Status::Closed { reason, .. } => Some(reason),
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == Status::Running
    }

    pub fn add_handler(&mut self, handler: impl FnMut(&mut Position, &Context<'_>) + 'static) {
        self.handlers.push(Box::new(handler));
    }

    /// Per-unit profit under `close_type`, defaulting to the actual close
    /// reason, or a user close while still running.
    ///
    /// Automatic closures assume the worst price inside the current candle;
    /// a user close takes the candle's close.
    pub fn unit_profit(&self, close_type: Option<CloseType>) -> f64 {
        let close_type = close_type
            .or(self.close_type())
            .unwrap_or(CloseType::User);
        let candle = &self.price_close;

        let decisive = match (close_type, self.direction) {
            (CloseType::User, _) => candle.close,
            (CloseType::Margin, Direction::Long) => candle.low,
            (CloseType::Margin, Direction::Short) => candle.high,
            (CloseType::StopLoss, Direction::Long) => candle.low,
            (CloseType::StopLoss, Direction::Short) => candle.high,
            (CloseType::TakeProfit, Direction::Long) => candle.high,
            (CloseType::TakeProfit, Direction::Short) => candle.low,
        };

        self.instrument
            .round(self.direction.sign() * (decisive - self.price_open.mean()))
    }

    pub fn profit(&self, close_type: Option<CloseType>) -> f64 {
        self.base_currency()
            .round(self.unit_profit(close_type) * self.amount)
    }

    /// Margin plus profit: what the account gets back on close.
    pub fn payback(&self, close_type: Option<CloseType>) -> f64 {
        self.base_currency()
            .round(self.margin + self.profit(close_type))
    }

    pub fn margin_convert(&self, currency: Currency) -> f64 {
        currency.round(self.base_currency().convert(self.margin, currency))
    }

    pub fn profit_convert(&self, currency: Currency) -> f64 {
        currency.round(self.base_currency().convert(self.profit(None), currency))
    }

    pub fn payback_convert(&self, currency: Currency) -> f64 {
        currency.round(self.base_currency().convert(self.payback(None), currency))
    }

    /// Re-price against `context` and close on the first matching condition,
    /// checked as margin call, then stop-loss, then take-profit.
    /// Returns whether the position is still running.
    pub fn refresh(&mut self, context: &Context<'_>) -> Result<bool, SimError> {
        self.ensure_running()?;
        self.freeze_price_close(context)?;

        let mut handlers = std::mem::take(&mut self.handlers);
        for handler in handlers.iter_mut() {
            handler(self, context);
        }
        handlers.append(&mut self.handlers);
        self.handlers = handlers;

        if !self.is_running() {
            return Ok(false);
        }

        let reason = if self.profit(Some(CloseType::Margin)) <= -self.margin {
            Some(CloseType::Margin)
        } else if self
            .stop_loss
            .is_some_and(|sl| self.unit_profit(Some(CloseType::StopLoss)) <= -sl)
        {
            Some(CloseType::StopLoss)
        } else if self
            .take_profit
            .is_some_and(|tp| self.unit_profit(Some(CloseType::TakeProfit)) >= tp)
        {
            Some(CloseType::TakeProfit)
        } else {
            None
        };

        if let Some(reason) = reason {
            self.status = Status::Closed {
                time: context.time(),
                reason,
            };
        }
        Ok(self.is_running())
    }

    /// Close at the current price on user request.
    pub fn close(&mut self, context: &Context<'_>) -> Result<(), SimError> {
        self.ensure_running()?;
        self.freeze_price_close(context)?;
        self.status = Status::Closed {
            time: context.time(),
            reason: CloseType::User,
        };
        Ok(())
    }

    fn ensure_running(&self) -> Result<(), SimError> {
        if self.is_running() {
            Ok(())
        } else {
            Err(SimError::PositionAlreadyClosed { id: self.id })
        }
    }

    fn freeze_price_close(&mut self, context: &Context<'_>) -> Result<(), SimError> {
        let instrument = context.get_instrument(&self.instrument.name)?;
        self.price_close = self.direction.close_candle(instrument.price()?);
        Ok(())
    }
}

impl fmt::Debug for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Position")
            .field("id", &self.id)
            .field("instrument", &self.instrument.name)
            .field("lot", &self.lot)
            .field("count", &self.count)
            .field("margin", &self.margin)
            .field("direction", &self.direction)
            .field("take_profit", &self.take_profit)
            .field("stop_loss", &self.stop_loss)
            .field("price_open", &self.price_open)
            .field("price_close", &self.price_close)
            .field("time_open", &self.time_open)
            .field("status", &self.status)
            .field("handlers", &self.handlers.len())
            .finish()
    }
}
