//! Built-in ladder strategy.
//!
//! Keeps opening identical positions on one instrument, one per tick, until
//! `max_running` are open at once. Closed rungs are replaced on later ticks.

use super::account::Account;
use super::context::Context;
use super::error::SimError;
use super::position::{Direction, Lot};
use super::watch_list::WatchList;
use crate::ports::controller::Controller;

#[derive(Debug, Clone, PartialEq)]
pub struct LadderConfig {
    pub instrument: String,
    pub lot: Lot,
    pub count: u32,
    pub direction: Direction,
    pub take_profit: Option<f64>,
    pub stop_loss: Option<f64>,
    pub max_running: usize,
}

#[derive(Debug)]
pub struct LadderStrategy {
    config: LadderConfig,
    steps_count: u64,
}

impl LadderStrategy {
    pub fn new(config: LadderConfig) -> Self {
        LadderStrategy {
            config,
            steps_count: 0,
        }
    }

    pub fn config(&self) -> &LadderConfig {
        &self.config
    }

    pub fn steps_count(&self) -> u64 {
        self.steps_count
    }
}

impl Controller for LadderStrategy {
    fn on_start(&mut self, steps_count: u64) {
        self.steps_count = steps_count;
    }

    fn tick(
        &mut self,
        _step: u64,
        context: &Context<'_>,
        account: &mut Account,
        watch_list: &mut WatchList,
    ) -> Result<Option<String>, SimError> {
        let mut result = None;
        if account.count_running() < self.config.max_running {
            let position = account.position_open(
                context,
                &self.config.instrument,
                self.config.lot,
                self.config.count,
                self.config.direction,
                self.config.take_profit,
                self.config.stop_loss,
            )?;
            result = Some(format!("opened {}", position.id()));
        }

        let currency = account.currency();
        watch_list.add(
            "equity",
            format!("{} {}", currency.format(account.equity()), currency),
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::currency::Currency;
    use crate::domain::testkit::*;

    fn ladder(max_running: usize) -> LadderStrategy {
        LadderStrategy::new(LadderConfig {
            instrument: "EUR_USD".into(),
            lot: Lot::Micro,
            count: 1,
            direction: Direction::Short,
            take_profit: Some(0.0050),
            stop_loss: Some(0.0050),
            max_running,
        })
    }

    #[test]
    fn opens_until_limit() {
        let data = instrument((0..4).map(|m| quote(m, flat(1.1), flat(1.1))).collect());
        let mut strategy = ladder(2);
        strategy.on_start(3);
        assert_eq!(strategy.steps_count(), 3);

        let mut account = Account::new(50_000.0, Currency::USD);
        let mut results = Vec::new();
        for minute in 0..4 {
            let context = context_at(&data, minute);
            account.refresh(&context).unwrap();
            let mut watch = WatchList::new();
            results.push(
                strategy
                    .tick(minute as u64, &context, &mut account, &mut watch)
                    .unwrap(),
            );
            assert!(watch.get("equity").is_some());
        }

        assert_eq!(
            results,
            vec![
                Some("opened 1".to_string()),
                Some("opened 2".to_string()),
                None,
                None
            ]
        );
        assert_eq!(account.count_running(), 2);
        assert_eq!(account.balance(), 49_960.0);
    }

    #[test]
    fn funding_failure_is_reported() {
        let data = instrument(vec![quote(0, flat(1.1), flat(1.1))]);
        let context = context_at(&data, 0);
        let mut account = Account::new(5.0, Currency::USD);
        account.refresh(&context).unwrap();

        let err = ladder(1)
            .tick(0, &context, &mut account, &mut WatchList::new())
            .unwrap_err();
        assert_eq!(err.kind(), "BalanceTooLow");
    }
}
