//! Cash, margin and position ledger.
//!
//! `equity = balance + running payback`, where running payback is the sum of
//! what every still-open position would return if closed now, converted to
//! the account currency. Opening debits margin; closing credits payback.
//! Running payback is kept current by open, close and refresh alike.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use super::context::Context;
use super::currency::Currency;
use super::error::SimError;
use super::position::{Direction, Lot, Position, PositionId};

#[derive(Debug)]
pub struct Account {
    currency: Currency,
    balance: f64,
    payback_running: f64,
    time: Option<DateTime<Utc>>,
    next_id: u64,
    positions: BTreeMap<PositionId, Position>,
    running: Vec<PositionId>,
    closed: Vec<PositionId>,
}

impl Account {
    pub fn new(balance: f64, currency: Currency) -> Self {
        Account {
            currency,
            balance: currency.round(balance),
            payback_running: 0.0,
            time: None,
            next_id: 1,
            positions: BTreeMap::new(),
            running: Vec::new(),
            closed: Vec::new(),
        }
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn balance(&self) -> f64 {
        self.balance
    }

    pub fn payback_running(&self) -> f64 {
        self.currency.round(self.payback_running)
    }

    pub fn equity(&self) -> f64 {
        self.currency.round(self.balance + self.payback_running)
    }

    /// Time of the context the account was last refreshed against.
    pub fn time(&self) -> Option<DateTime<Utc>> {
        self.time
    }

    pub fn count_running(&self) -> usize {
        self.running.len()
    }

    pub fn count_closed(&self) -> usize {
        self.closed.len()
    }

    /// Running positions in opening order.
    pub fn positions_running(&self) -> impl Iterator<Item = &Position> {
        self.running.iter().filter_map(|id| self.positions.get(id))
    }

    /// Closed positions in closing order.
    pub fn positions_closed(&self) -> impl Iterator<Item = &Position> {
        self.closed.iter().filter_map(|id| self.positions.get(id))
    }

    pub fn position_get(&self, id: PositionId) -> Result<&Position, SimError> {
        self.positions
            .get(&id)
            .ok_or(SimError::PositionNotFound { id })
    }

    pub fn position_get_mut(&mut self, id: PositionId) -> Result<&mut Position, SimError> {
        self.positions
            .get_mut(&id)
            .ok_or(SimError::PositionNotFound { id })
    }

    /// Open a position on `instrument` and debit its margin.
    ///
    /// Nothing changes if the margin exceeds the balance or the instrument
    /// has no price at this tick.
    #[allow(clippy::too_many_arguments)]
    pub fn position_open(
        &mut self,
        context: &Context<'_>,
        instrument: &str,
        lot: Lot,
        count: u32,
        direction: Direction,
        take_profit: Option<f64>,
        stop_loss: Option<f64>,
    ) -> Result<&Position, SimError> {
        self.ensure_bound(context)?;
        let instrument_context = context.get_instrument(instrument)?;

        let id = PositionId(self.next_id);
        let position = Position::open(
            id,
            instrument_context,
            lot,
            count,
            direction,
            take_profit,
            stop_loss,
        )?;

        let margin = position.margin_convert(self.currency);
        if margin > self.balance {
            return Err(SimError::BalanceTooLow {
                balance: self.balance,
                margin,
            });
        }

        self.next_id += 1;
        self.balance = self.currency.round(self.balance - margin);
        self.payback_running += position.payback_convert(self.currency);
        self.running.push(id);
        tracing::debug!(
            "opened position {} {} {} x{} at {}",
            id,
            direction,
            instrument,
            count,
            context.time()
        );
        Ok(self.positions.entry(id).or_insert(position))
    }

    /// Close a running position at the current price and credit its payback.
    pub fn position_close(
        &mut self,
        context: &Context<'_>,
        id: PositionId,
    ) -> Result<&Position, SimError> {
        self.ensure_bound(context)?;
        let position = self
            .positions
            .get_mut(&id)
            .ok_or(SimError::PositionNotFound { id })?;
        position.close(context)?;

        self.running.retain(|running| *running != id);
        self.revalue_running();
        self.resolve_closed(id);
        self.position_get(id)
    }

    /// Bind to `context`, re-price every running position and settle the
    /// ones that closed.
    ///
    /// Every position is refreshed even if an earlier one fails. A failed
    /// position keeps running on its last price and still counts toward
    /// equity; the first failure is returned once bookkeeping is done.
    pub fn refresh(&mut self, context: &Context<'_>) -> Result<(), SimError> {
        self.time = Some(context.time());

        let mut first_error = None;
        let mut still_running = Vec::with_capacity(self.running.len());
        let mut just_closed = Vec::new();

        for id in std::mem::take(&mut self.running) {
            let Some(position) = self.positions.get_mut(&id) else {
                continue;
            };
            match position.refresh(context) {
                Ok(true) => still_running.push(id),
                Ok(false) => just_closed.push(id),
                Err(err) => {
                    first_error.get_or_insert(err);
                    still_running.push(id);
                }
            }
        }

        self.running = still_running;
        self.revalue_running();

        for id in just_closed {
            self.resolve_closed(id);
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Recompute running payback from the positions still running.
    fn revalue_running(&mut self) {
        self.payback_running = self
            .positions_running()
            .map(|position| position.payback_convert(self.currency))
            .sum();
    }

    fn ensure_bound(&self, context: &Context<'_>) -> Result<(), SimError> {
        if self.time == Some(context.time()) {
            Ok(())
        } else {
            Err(SimError::ContextNotBound {
                time: context.time(),
            })
        }
    }

    fn resolve_closed(&mut self, id: PositionId) {
        let Some(position) = self.positions.get(&id) else {
            return;
        };
        let payback = position.payback_convert(self.currency);
        tracing::debug!(
            "closed position {} ({}) payback {} {}",
            id,
            position
                .close_type()
                .map(|c| c.to_string())
                .unwrap_or_default(),
            payback,
            self.currency
        );
        self.balance = self.currency.round(self.balance + payback);
        self.closed.push(id);
    }
}
