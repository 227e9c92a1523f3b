//! Strategy plug-in port.

use crate::domain::account::Account;
use crate::domain::context::Context;
use crate::domain::error::SimError;
use crate::domain::watch_list::WatchList;

/// A strategy driven by the simulation loop.
///
/// `tick` sees only data up to the context's time. It may open and close
/// positions on the account and publish telemetry into the watch list.
/// Returning `Ok(None)` leaves nothing in the output log for this tick; an
/// error is recorded as the tick's result and the run continues.
pub trait Controller {
    /// Called once before the first tick with the number of steps in the run.
    fn on_start(&mut self, _steps_count: u64) {}

    fn tick(
        &mut self,
        step: u64,
        context: &Context<'_>,
        account: &mut Account,
        watch_list: &mut WatchList,
    ) -> Result<Option<String>, SimError>;
}
