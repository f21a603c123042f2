//! Binds a strategy to its host ports and dispatches scheduled hooks.

use crate::domain::error::FactorTraderError;
use crate::domain::hooks::{RebalanceReport, daily_rebalance, monthly_refresh};
use crate::domain::scoring::ScoringReport;
use crate::domain::strategy::{StrategyConfig, StrategyState};
use crate::ports::market_data_port::MarketDataPort;
use crate::ports::scheduler_port::{Hook, HookHandler};
use crate::ports::trading_port::TradingPort;
use chrono::NaiveDate;

pub struct StrategyRunner<'a> {
    config: StrategyConfig,
    state: StrategyState,
    data: &'a dyn MarketDataPort,
    trading: &'a mut dyn TradingPort,
    refreshes: Vec<(NaiveDate, ScoringReport)>,
    rebalances: Vec<RebalanceReport>,
}

impl<'a> StrategyRunner<'a> {
    pub fn new(
        config: StrategyConfig,
        data: &'a dyn MarketDataPort,
        trading: &'a mut dyn TradingPort,
    ) -> Self {
        let state = StrategyState::new(&config);
        StrategyRunner {
            config,
            state,
            data,
            trading,
            refreshes: Vec::new(),
            rebalances: Vec::new(),
        }
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    pub fn state(&self) -> &StrategyState {
        &self.state
    }

    pub fn refreshes(&self) -> &[(NaiveDate, ScoringReport)] {
        &self.refreshes
    }

    pub fn rebalances(&self) -> &[RebalanceReport] {
        &self.rebalances
    }
}

impl HookHandler for StrategyRunner<'_> {
    fn on_hook(&mut self, hook: Hook, date: NaiveDate) -> Result<(), FactorTraderError> {
        match hook {
            Hook::Refresh => {
                let report = monthly_refresh(&self.config, &mut self.state, self.data, date)?;
                self.refreshes.push((date, report));
            }
            Hook::Rebalance => {
                self.trading.begin_session(date);
                let report =
                    daily_rebalance(&self.config, &self.state, self.data, &mut *self.trading, date)?;
                self.rebalances.push(report);
            }
        }
        Ok(())
    }
}
