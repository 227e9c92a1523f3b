//! Line-oriented tick sink.

use std::io::{self, Write};

use crate::domain::account::Account;
use crate::domain::sim_loop::TickOutput;
use crate::domain::watch_list::WatchList;
use crate::ports::tick_sink::TickSink;

/// Writes the watch list as one `key=value` line every `every` ticks and
/// each new tick result as `[step] time result`.
///
/// Write failures stop all further output; the first one is reported by
/// [`ConsoleSink::finish`].
pub struct ConsoleSink<W: Write> {
    writer: W,
    every: u64,
    ticks: u64,
    printed: usize,
    error: Option<io::Error>,
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(writer: W, every: u64) -> Self {
        Self {
            writer,
            every: every.max(1),
            ticks: 0,
            printed: 0,
            error: None,
        }
    }

    pub fn finish(mut self) -> io::Result<W> {
        if let Some(err) = self.error.take() {
            return Err(err);
        }
        self.writer.flush()?;
        Ok(self.writer)
    }

    fn write_tick(&mut self, watch_list: &WatchList, output: &[TickOutput]) -> io::Result<()> {
        if self.ticks % self.every == 0 {
            writeln!(self.writer, "{watch_list}")?;
        }
        for item in output.iter().skip(self.printed) {
            writeln!(
                self.writer,
                "[{}] {} {}",
                item.step,
                item.time.format("%Y-%m-%d %H:%M:%S"),
                item.result
            )?;
        }
        self.printed = output.len();
        Ok(())
    }
}

impl<W: Write> TickSink for ConsoleSink<W> {
    fn after_tick(&mut self, _account: &Account, watch_list: &WatchList, output: &[TickOutput]) {
        if self.error.is_none() {
            if let Err(err) = self.write_tick(watch_list, output) {
                self.error = Some(err);
            }
        }
        self.ticks += 1;
    }
}
