//! Illustrative event-replay backtest
//!
//! Replays buy/sell events against a cash account. This is a sanity check
//! for the screener's levels, not a rigorous simulation: no fees, no
//! slippage, fills at the event price.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::EngineResult;
use crate::screener::Screener;
use crate::types::{Screening, Series, SignalKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeAction {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventReason {
    Signal(SignalKind),
    StopLoss,
    TakeProfit,
    EndOfData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeEvent {
    pub timestamp: NaiveDateTime,
    pub action: TradeAction,
    pub price: Decimal,
    pub reason: EventReason,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub initial_capital: Decimal,
    /// Position size as percentage of equity (e.g., 10 = 10%)
    pub position_size_pct: Decimal,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_capital: dec!(100000),
            position_size_pct: dec!(10),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestTrade {
    pub entry_time: NaiveDateTime,
    pub exit_time: NaiveDateTime,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    pub size: Decimal,
    pub pnl: Decimal,
    pub pnl_pct: Decimal,
    pub exit_reason: EventReason,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub time: NaiveDateTime,
    pub equity: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub symbol: String,
    pub initial_capital: Decimal,
    pub final_equity: Decimal,
    pub total_pnl: Decimal,
    pub total_return_pct: Decimal,
    pub total_trades: u32,
    pub winning_trades: u32,
    pub losing_trades: u32,
    pub win_rate: Decimal,
    pub avg_win: Decimal,
    pub avg_loss: Decimal,
    /// Average win over the absolute average loss
    pub profit_factor: Decimal,
    pub max_drawdown: Decimal,
    pub max_drawdown_pct: Decimal,
    pub trades: Vec<BacktestTrade>,
    pub equity_curve: Vec<EquityPoint>,
}

/// Position state during replay
struct OpenPosition {
    entry_time: NaiveDateTime,
    entry_price: Decimal,
    size: Decimal,
}

/// Cap reported when there are wins but no losses
const PROFIT_FACTOR_CAP: Decimal = dec!(999.99);

pub struct BacktestEngine;

impl BacktestEngine {
    /// Replay `events` in order. Buys while holding and sells while flat are
    /// ignored. A position still open after the last event is closed at that
    /// event's price.
    pub fn run(config: &BacktestConfig, symbol: &str, events: &[TradeEvent]) -> BacktestResult {
        let mut equity = config.initial_capital;
        let mut peak_equity = equity;
        let mut max_drawdown = Decimal::ZERO;
        let mut max_drawdown_pct = Decimal::ZERO;

        let mut trades: Vec<BacktestTrade> = Vec::new();
        let mut equity_curve: Vec<EquityPoint> = Vec::new();
        let mut position: Option<OpenPosition> = None;

        let hundred = dec!(100);

        info!(
            symbol,
            events = events.len(),
            capital = %config.initial_capital,
            "Starting backtest"
        );

        for event in events {
            match event.action {
                TradeAction::Buy => {
                    if position.is_none() && event.price > Decimal::ZERO {
                        let position_value = equity * config.position_size_pct / hundred;
                        let size = position_value / event.price;
                        position = Some(OpenPosition {
                            entry_time: event.timestamp,
                            entry_price: event.price,
                            size,
                        });
                        debug!(price = %event.price, size = %size, "Opened position");
                    }
                }
                TradeAction::Sell => {
                    if let Some(pos) = position.take() {
                        let trade = close_position(pos, event.timestamp, event.price, event.reason);
                        equity += trade.pnl;
                        debug!(
                            entry = %trade.entry_price,
                            exit = %trade.exit_price,
                            pnl = %trade.pnl,
                            "Closed position"
                        );
                        trades.push(trade);
                    }
                }
            }

            let unrealized = position
                .as_ref()
                .map_or(Decimal::ZERO, |pos| (event.price - pos.entry_price) * pos.size);
            let current_equity = equity + unrealized;
            equity_curve.push(EquityPoint {
                time: event.timestamp,
                equity: current_equity,
            });

            if current_equity > peak_equity {
                peak_equity = current_equity;
            }
            let drawdown = peak_equity - current_equity;
            if drawdown > max_drawdown {
                max_drawdown = drawdown;
                if peak_equity > Decimal::ZERO {
                    max_drawdown_pct = drawdown / peak_equity * hundred;
                }
            }
        }

        if let (Some(pos), Some(last)) = (position.take(), events.last()) {
            let trade = close_position(pos, last.timestamp, last.price, EventReason::EndOfData);
            equity += trade.pnl;
            trades.push(trade);
        }

        let total_trades = trades.len() as u32;
        let wins: Vec<Decimal> = trades
            .iter()
            .filter(|t| t.pnl > Decimal::ZERO)
            .map(|t| t.pnl)
            .collect();
        let losses: Vec<Decimal> = trades
            .iter()
            .filter(|t| t.pnl <= Decimal::ZERO)
            .map(|t| t.pnl)
            .collect();
        let winning_trades = wins.len() as u32;
        let losing_trades = losses.len() as u32;

        let win_rate = if total_trades > 0 {
            Decimal::from(winning_trades) / Decimal::from(total_trades) * hundred
        } else {
            Decimal::ZERO
        };

        let avg_win = average(&wins);
        let avg_loss = average(&losses);
        let profit_factor = if avg_loss < Decimal::ZERO {
            avg_win / avg_loss.abs()
        } else if avg_win > Decimal::ZERO {
            PROFIT_FACTOR_CAP
        } else {
            Decimal::ZERO
        };

        let total_pnl = equity - config.initial_capital;
        let total_return_pct = if config.initial_capital > Decimal::ZERO {
            total_pnl / config.initial_capital * hundred
        } else {
            Decimal::ZERO
        };

        info!(
            total_trades,
            winning_trades,
            win_rate = %win_rate.round_dp(2),
            total_pnl = %total_pnl.round_dp(2),
            max_drawdown = %max_drawdown.round_dp(2),
            "Backtest complete"
        );

        BacktestResult {
            symbol: symbol.to_string(),
            initial_capital: config.initial_capital,
            final_equity: equity,
            total_pnl,
            total_return_pct,
            total_trades,
            winning_trades,
            losing_trades,
            win_rate,
            avg_win,
            avg_loss,
            profit_factor,
            max_drawdown,
            max_drawdown_pct,
            trades,
            equity_curve,
        }
    }
}

fn close_position(
    pos: OpenPosition,
    exit_time: NaiveDateTime,
    exit_price: Decimal,
    exit_reason: EventReason,
) -> BacktestTrade {
    let pnl = (exit_price - pos.entry_price) * pos.size;
    let pnl_pct = if pos.entry_price > Decimal::ZERO {
        (exit_price - pos.entry_price) / pos.entry_price * dec!(100)
    } else {
        Decimal::ZERO
    };
    BacktestTrade {
        entry_time: pos.entry_time,
        exit_time,
        entry_price: pos.entry_price,
        exit_price,
        size: pos.size,
        pnl,
        pnl_pct,
        exit_reason,
    }
}

fn average(values: &[Decimal]) -> Decimal {
    if values.is_empty() {
        return Decimal::ZERO;
    }
    values.iter().sum::<Decimal>() / Decimal::from(values.len())
}

fn to_price(value: f64) -> Option<Decimal> {
    Decimal::from_f64_retain(value).map(|d| d.round_dp(4))
}

/// Derive events by screening every growing prefix of `series`. Buys on a
/// recommendation while flat; sells when the close reaches the stop or the
/// target, or on the final candle.
pub fn walk_forward(screener: &Screener, series: &Series) -> EngineResult<Vec<TradeEvent>> {
    let candles = series.candles();
    let start = screener.config().required_history().max(1);
    let mut events = Vec::new();
    let mut open: Option<(f64, f64)> = None;

    for end in start..=candles.len() {
        let candle = &candles[end - 1];
        let Some(price) = to_price(candle.close) else {
            continue;
        };
        let is_last = end == candles.len();

        match open {
            Some((stop, target)) => {
                let reason = if candle.close <= stop {
                    Some(EventReason::StopLoss)
                } else if candle.close >= target {
                    Some(EventReason::TakeProfit)
                } else if is_last {
                    Some(EventReason::EndOfData)
                } else {
                    None
                };
                if let Some(reason) = reason {
                    events.push(TradeEvent {
                        timestamp: candle.timestamp,
                        action: TradeAction::Sell,
                        price,
                        reason,
                    });
                    open = None;
                }
            }
            None if !is_last => {
                if let Screening::Recommended(record) =
                    screener.screen_series(&series.prefix(end), None)?
                {
                    events.push(TradeEvent {
                        timestamp: candle.timestamp,
                        action: TradeAction::Buy,
                        price,
                        reason: EventReason::Signal(record.signal),
                    });
                    open = Some((record.stop_loss, record.take_profit));
                }
            }
            None => {}
        }
    }

    debug!(symbol = series.symbol(), events = events.len(), "Walk-forward replay built");
    Ok(events)
}
