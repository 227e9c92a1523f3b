//! Tick driver.
//!
//! Each tick builds a fresh [`Context`] over every registered instrument,
//! refreshes the account against it and hands it to the controllers in
//! registration order. Anything a tick fails with is recorded as that tick's
//! result; only cancellation stops a run early.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use super::account::Account;
use super::context::Context;
use super::currency::Currency;
use super::error::{FxsimError, SimError};
use super::granularity::Granularity;
use super::instrument::InstrumentData;
use super::watch_list::WatchList;
use crate::ports::controller::Controller;
use crate::ports::tick_sink::TickSink;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Result recorded when no controller reports anything else.
pub const NO_RESULT: &str = "N/A";

/// One non-empty tick result.
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutput {
    pub step: u64,
    pub time: DateTime<Utc>,
    pub result: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// Ticks actually executed.
    pub steps: u64,
    pub failed_ticks: u64,
    pub cancelled: bool,
    pub output: Vec<TickOutput>,
}

/// Everything a run needs besides its controllers and data source.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub balance: f64,
    pub currency: Currency,
    pub symbols: Vec<String>,
    pub granularities: Vec<Granularity>,
    pub time_step: Granularity,
    pub time_from: DateTime<Utc>,
    pub time_to: DateTime<Utc>,
    /// Watch list lines are written every this many ticks.
    pub output_every: u64,
}

pub struct SimLoop {
    account: Account,
    instruments: Vec<InstrumentData>,
    controllers: Vec<Box<dyn Controller>>,
    time_min: Option<DateTime<Utc>>,
    time_max: Option<DateTime<Utc>>,
}

impl SimLoop {
    pub fn new(account: Account) -> Self {
        SimLoop {
            account,
            instruments: Vec::new(),
            controllers: Vec::new(),
            time_min: None,
            time_max: None,
        }
    }

    /// Register instrument data, replacing an earlier registration of the
    /// same symbol. The loop can run over the common coverage of all of them.
    pub fn add_instrument(&mut self, data: InstrumentData) -> Result<(), FxsimError> {
        if data.time_from().is_none() || data.time_to().is_none() {
            return Err(FxsimError::NoData {
                symbol: data.name().to_string(),
            });
        }

        match self
            .instruments
            .iter_mut()
            .find(|existing| existing.name() == data.name())
        {
            Some(existing) => *existing = data,
            None => self.instruments.push(data),
        }

        self.time_min = self
            .instruments
            .iter()
            .filter_map(InstrumentData::time_from)
            .max();
        self.time_max = self
            .instruments
            .iter()
            .filter_map(InstrumentData::time_to)
            .min();
        Ok(())
    }

    pub fn add_controller(&mut self, controller: Box<dyn Controller>) {
        self.controllers.push(controller);
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    pub fn into_account(self) -> Account {
        self.account
    }

    pub fn instruments(&self) -> &[InstrumentData] {
        &self.instruments
    }

    /// Latest start across registered instruments.
    pub fn time_min(&self) -> Option<DateTime<Utc>> {
        self.time_min
    }

    /// Earliest end across registered instruments.
    pub fn time_max(&self) -> Option<DateTime<Utc>> {
        self.time_max
    }

    /// Step from `time_from` to `time_to` inclusive in `time_step` increments.
    ///
    /// Fails before the first tick if the window is inverted or reaches past
    /// the data every instrument has.
    pub fn run(
        &mut self,
        time_step: Granularity,
        time_from: DateTime<Utc>,
        time_to: DateTime<Utc>,
        sink: &mut dyn TickSink,
        cancel: Option<&AtomicBool>,
    ) -> Result<RunSummary, FxsimError> {
        self.check_window(time_from, time_to)?;

        let steps_count = ((time_to - time_from).num_seconds() / time_step.seconds()) as u64;
        for controller in self.controllers.iter_mut() {
            controller.on_start(steps_count);
        }
        tracing::info!(
            "simulating {} steps of {} from {} to {}",
            steps_count + 1,
            time_step,
            time_from.format(TIME_FORMAT),
            time_to.format(TIME_FORMAT)
        );

        let realtime_start = Instant::now();
        let mut summary = RunSummary {
            steps: 0,
            failed_ticks: 0,
            cancelled: false,
            output: Vec::new(),
        };

        let mut current_time = time_from;
        let mut step: u64 = 0;

        while current_time <= time_to {
            if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                tracing::info!("simulation stopped at step {}", step);
                summary.cancelled = true;
                break;
            }

            let mut watch_list = self.seed_watch_list(step, current_time, realtime_start);

            let result = match self.tick(step, current_time, &mut watch_list) {
                Ok(result) => result,
                Err(err) => {
                    tracing::warn!("step {} at {} failed: {}", step, current_time, err);
                    summary.failed_ticks += 1;
                    Some(format!("{}: {}", err.kind(), err))
                }
            };

            if let Some(result) = result {
                summary.output.push(TickOutput {
                    step,
                    time: current_time,
                    result,
                });
            }

            sink.after_tick(&self.account, &watch_list, &summary.output);

            current_time += time_step.duration();
            step += 1;
        }

        summary.steps = step;
        tracing::info!(
            "simulation finished after {} steps ({} failed): balance {} equity {} {}",
            summary.steps,
            summary.failed_ticks,
            self.account.currency().format(self.account.balance()),
            self.account.currency().format(self.account.equity()),
            self.account.currency()
        );
        Ok(summary)
    }

    fn check_window(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<(), FxsimError> {
        if from > to {
            return Err(FxsimError::InvalidWindow { from, to });
        }
        if let (Some(available_from), Some(available_to)) = (self.time_min, self.time_max) {
            if from < available_from || to > available_to {
                return Err(FxsimError::WindowOutOfRange {
                    from,
                    to,
                    available_from,
                    available_to,
                });
            }
        }
        Ok(())
    }

    fn seed_watch_list(&self, step: u64, time: DateTime<Utc>, started: Instant) -> WatchList {
        let currency = self.account.currency();
        let mut watch_list = WatchList::new();
        watch_list.add("step", step);
        watch_list.add("duration", format!("{:.3}s", started.elapsed().as_secs_f64()));
        watch_list.add("time", time.format(TIME_FORMAT));
        watch_list.add(
            "balance",
            format!("{} {}", currency.format(self.account.balance()), currency),
        );
        watch_list.add("running", self.account.count_running());
        watch_list.add("closed", self.account.count_closed());
        watch_list
    }

    fn tick(
        &mut self,
        step: u64,
        time: DateTime<Utc>,
        watch_list: &mut WatchList,
    ) -> Result<Option<String>, SimError> {
        let mut context = Context::new(time);
        for data in &self.instruments {
            context.add_instrument(data)?;
        }

        self.account.refresh(&context)?;

        let mut result = Some(NO_RESULT.to_string());
        for controller in self.controllers.iter_mut() {
            result = controller.tick(step, &context, &mut self.account, watch_list)?;
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::instrument::InstrumentMeta;
    use crate::domain::position::{Direction, Lot};
    use crate::domain::testkit::*;
    use crate::domain::timeframe::Timeframe;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn market() -> InstrumentData {
        instrument(
            (0..=10)
                .map(|m| quote(m, flat(1.1000), flat(1.1002)))
                .collect(),
        )
    }

    fn new_loop() -> SimLoop {
        let mut sim = SimLoop::new(Account::new(50_000.0, Currency::USD));
        sim.add_instrument(market()).unwrap();
        sim
    }

    fn no_sink() -> impl FnMut(&Account, &WatchList, &[TickOutput]) {
        |_: &Account, _: &WatchList, _: &[TickOutput]| {}
    }

    /// Replies with a fixed script, one entry per tick.
    struct Scripted {
        replies: Vec<Result<Option<String>, SimError>>,
        started_with: Rc<RefCell<Option<u64>>>,
    }

    impl Controller for Scripted {
        fn on_start(&mut self, steps_count: u64) {
            *self.started_with.borrow_mut() = Some(steps_count);
        }

        fn tick(
            &mut self,
            step: u64,
            _context: &Context<'_>,
            _account: &mut Account,
            _watch_list: &mut WatchList,
        ) -> Result<Option<String>, SimError> {
            self.replies
                .get(step as usize)
                .cloned()
                .unwrap_or(Ok(None))
        }
    }

    struct Opener;

    impl Controller for Opener {
        fn tick(
            &mut self,
            _step: u64,
            context: &Context<'_>,
            account: &mut Account,
            watch_list: &mut WatchList,
        ) -> Result<Option<String>, SimError> {
            let id = account
                .position_open(context, "EUR_USD", Lot::Micro, 1, Direction::Long, None, None)?
                .id();
            watch_list.add("equity", account.equity());
            Ok(Some(format!("opened {id}")))
        }
    }

    #[test]
    fn end_boundary_is_inclusive() {
        let mut sim = new_loop();
        let summary = sim
            .run(Granularity::M1, t(0), t(3), &mut no_sink(), None)
            .unwrap();
        assert_eq!(summary.steps, 4);
        assert_eq!(summary.failed_ticks, 0);
        assert!(!summary.cancelled);
        assert_eq!(summary.output.len(), 4);
        assert!(summary.output.iter().all(|o| o.result == NO_RESULT));
        assert_eq!(summary.output[3].time, t(3));
    }

    #[test]
    fn controller_errors_degrade_to_results() {
        let started_with = Rc::new(RefCell::new(None));
        let mut sim = new_loop();
        sim.add_controller(Box::new(Scripted {
            replies: vec![
                Ok(Some("first".into())),
                Err(SimError::Strategy {
                    reason: "boom".into(),
                }),
                Ok(None),
                Ok(Some("last".into())),
            ],
            started_with: Rc::clone(&started_with),
        }));

        let summary = sim
            .run(Granularity::M1, t(0), t(3), &mut no_sink(), None)
            .unwrap();

        assert_eq!(*started_with.borrow(), Some(3));
        assert_eq!(summary.steps, 4);
        assert_eq!(summary.failed_ticks, 1);
        let results: Vec<(u64, &str)> = summary
            .output
            .iter()
            .map(|o| (o.step, o.result.as_str()))
            .collect();
        assert_eq!(
            results,
            vec![(0, "first"), (1, "Strategy: boom"), (3, "last")]
        );
    }

    #[test]
    fn last_controller_result_wins() {
        let mut sim = new_loop();
        sim.add_controller(Box::new(Opener));
        sim.add_controller(Box::new(Scripted {
            replies: vec![Ok(Some("second".into()))],
            started_with: Rc::new(RefCell::new(None)),
        }));

        let summary = sim
            .run(Granularity::M1, t(0), t(1), &mut no_sink(), None)
            .unwrap();
        assert_eq!(summary.output.len(), 1);
        assert_eq!(summary.output[0].result, "second");
        assert_eq!(sim.account().count_running(), 2);
    }

    #[test]
    fn sink_sees_watch_list_after_each_tick() {
        let mut sim = new_loop();
        sim.add_controller(Box::new(Opener));

        let mut seen = Vec::new();
        let mut sink = |account: &Account, watch: &WatchList, output: &[TickOutput]| {
            seen.push((
                watch.get("step").map(String::from),
                watch.get("balance").map(String::from),
                watch.get("equity").map(String::from),
                account.count_running(),
                output.len(),
            ));
        };
        sim.run(Granularity::M1, t(0), t(1), &mut sink, None).unwrap();

        let keys: Vec<_> = seen.iter().map(|s| s.0.clone()).collect();
        assert_eq!(keys, vec![Some("0".into()), Some("1".into())]);
        // balance is captured before the tick's controllers run
        assert_eq!(seen[0].1.as_deref(), Some("50000.00 USD"));
        assert_eq!(seen[1].1.as_deref(), Some("49980.00 USD"));
        assert_eq!(seen[1].3, 2);
        assert_eq!(seen[1].4, 2);
        // each long is 2 pips under water: payback 19.8
        assert_eq!(seen[0].2.as_deref(), Some("49999.8"));
        assert_eq!(seen[1].2.as_deref(), Some("49999.6"));
    }

    #[test]
    fn cancellation_checked_between_ticks() {
        let cancel = AtomicBool::new(false);
        let mut sim = new_loop();
        let mut sink = |_: &Account, _: &WatchList, output: &[TickOutput]| {
            if output.len() == 2 {
                cancel.store(true, Ordering::Relaxed);
            }
        };
        let summary = sim
            .run(Granularity::M1, t(0), t(10), &mut sink, Some(&cancel))
            .unwrap();
        assert!(summary.cancelled);
        assert_eq!(summary.steps, 2);
    }

    #[test]
    fn inverted_window_rejected() {
        let mut sim = new_loop();
        let err = sim
            .run(Granularity::M1, t(3), t(1), &mut no_sink(), None)
            .unwrap_err();
        assert!(matches!(err, FxsimError::InvalidWindow { .. }));
    }

    #[test]
    fn window_beyond_data_rejected() {
        let mut sim = new_loop();
        let err = sim
            .run(Granularity::M1, t(0), t(11), &mut no_sink(), None)
            .unwrap_err();
        assert!(matches!(err, FxsimError::WindowOutOfRange { .. }));
    }

    #[test]
    fn instrument_without_rows_rejected() {
        let mut sim = SimLoop::new(Account::new(1_000.0, Currency::USD));
        let err = sim.add_instrument(instrument(Vec::new())).unwrap_err();
        assert!(matches!(err, FxsimError::NoData { .. }));
    }

    #[test]
    fn available_window_is_intersection() {
        let mut sim = new_loop();
        let meta = InstrumentMeta::new("GBP_USD", "CURRENCY", "GBP/USD", 5, -4, 0, 0.05).unwrap();
        let rows = (2..=12).map(|m| quote(m, flat(1.3), flat(1.3))).collect();
        let mut other = InstrumentData::new(meta);
        other
            .add_timeframe(Timeframe::new("GBP_USD", Granularity::M1, rows))
            .unwrap();
        sim.add_instrument(other).unwrap();

        assert_eq!(sim.time_min(), Some(t(2)));
        assert_eq!(sim.time_max(), Some(t(10)));
        assert_eq!(sim.instruments().len(), 2);
    }

    #[test]
    fn replacing_an_instrument_recomputes_window() {
        let mut sim = SimLoop::new(Account::new(50_000.0, Currency::USD));
        let narrow = (4..=6).map(|m| quote(m, flat(1.1), flat(1.1))).collect();
        sim.add_instrument(instrument(narrow)).unwrap();
        assert_eq!(sim.time_min(), Some(t(4)));
        assert_eq!(sim.time_max(), Some(t(6)));

        sim.add_instrument(market()).unwrap();
        assert_eq!(sim.instruments().len(), 1);
        assert_eq!(sim.time_min(), Some(t(0)));
        assert_eq!(sim.time_max(), Some(t(10)));
    }
}
