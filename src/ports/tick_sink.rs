//! After-tick telemetry port.

use crate::domain::account::Account;
use crate::domain::sim_loop::TickOutput;
use crate::domain::watch_list::WatchList;

/// Receives the state of the run after every tick. Purely an output channel.
pub trait TickSink {
    fn after_tick(&mut self, account: &Account, watch_list: &WatchList, output: &[TickOutput]);
}

impl<F> TickSink for F
where
    F: FnMut(&Account, &WatchList, &[TickOutput]),
{
    fn after_tick(&mut self, account: &Account, watch_list: &WatchList, output: &[TickOutput]) {
        self(account, watch_list, output)
    }
}
