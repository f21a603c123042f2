//! Replays registered hooks over a trading calendar.

use crate::domain::calendar::trading_day_of_month;
use crate::domain::error::FactorTraderError;
use crate::ports::scheduler_port::{Cadence, Hook, HookHandler, SchedulerPort};
use chrono::NaiveDate;
use tracing::debug;

#[derive(Debug, Default)]
pub struct CalendarScheduler {
    registrations: Vec<(Cadence, Hook)>,
}

impl CalendarScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registrations(&self) -> &[(Cadence, Hook)] {
        &self.registrations
    }

    /// Hooks due on `date`: monthly ones first, then daily, each in registration order.
    pub fn hooks_for(&self, timeline: &[NaiveDate], date: NaiveDate) -> Vec<Hook> {
        let Some(day) = trading_day_of_month(timeline, date) else {
            return Vec::new();
        };
        let monthly = self.registrations.iter().filter_map(|(cadence, hook)| match cadence {
            Cadence::Monthly { trading_day } if *trading_day == day => Some(*hook),
            _ => None,
        });
        let daily = self
            .registrations
            .iter()
            .filter(|(cadence, _)| *cadence == Cadence::Daily)
            .map(|(_, hook)| *hook);
        monthly.chain(daily).collect()
    }

    /// Fire due hooks for every date of a sorted `timeline`.
    ///
    /// Stops at the first hook error. Returns the number of invocations.
    pub fn run(
        &self,
        timeline: &[NaiveDate],
        handler: &mut dyn HookHandler,
    ) -> Result<usize, FactorTraderError> {
        self.run_from(timeline, NaiveDate::MIN, handler)
    }

    /// Like [`run`](Self::run), but only fires on dates from `start` onward.
    ///
    /// Month positions are still counted on the whole `calendar`, so a replay
    /// that starts mid-month keeps the real n-th trading date of that month.
    pub fn run_from(
        &self,
        calendar: &[NaiveDate],
        start: NaiveDate,
        handler: &mut dyn HookHandler,
    ) -> Result<usize, FactorTraderError> {
        let mut fired = 0;
        for &date in calendar.iter().filter(|d| **d >= start) {
            for hook in self.hooks_for(calendar, date) {
                debug!(%date, %hook, "firing hook");
                handler.on_hook(hook, date)?;
                fired += 1;
            }
        }
        Ok(fired)
    }
}

impl SchedulerPort for CalendarScheduler {
    fn register(&mut self, cadence: Cadence, hook: Hook) {
        self.registrations.push((cadence, hook));
    }
}
