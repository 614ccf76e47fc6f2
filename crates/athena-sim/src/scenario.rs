//! Scenario replay
//!
//! A scenario names its pools, positions and covers with labels and lists
//! collaborator events in time order. Each event is applied to a fresh
//! registry at its own timestamp; rejected events are recorded with the
//! engine's error instead of aborting the run unless configured otherwise.
//!
//! Event fields sit next to the `action` tag, so they are buffered before the
//! variant is known. That buffer has no room for 128-bit integers, which is why
//! token amounts are `u64` here and widened when they reach the engine.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use athena_common::{CoverId, PoolId, PositionId};
use athena_engine::{CoverUpdate, CoverView, CurveSettings, PoolState, Registry, RewardSettlement};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::SimConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    /// When the pools are created
    pub start: DateTime<Utc>,
    pub pools: Vec<PoolSpec>,
    #[serde(default)]
    pub events: Vec<Event>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PoolSpec {
    pub name: String,
    /// Falls back to the engine's default curve
    #[serde(default)]
    pub curve: Option<CurveSettings>,
    /// Labels of earlier pools this one may not share capital with
    #[serde(default)]
    pub incompatible_with: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub action: Action,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Deposit {
        position: String,
        pools: Vec<String>,
        amount: u64,
    },
    AddLiquidity {
        position: String,
        amount: u64,
    },
    TakeInterest {
        position: String,
    },
    Withdraw {
        position: String,
        amount: u64,
    },
    OpenCover {
        cover: String,
        pool: String,
        capital: u64,
        premium: u64,
    },
    UpdateCover {
        cover: String,
        #[serde(flatten)]
        update: UpdateAmounts,
    },
    CloseCover {
        cover: String,
    },
    Claim {
        pool: String,
        amount: u64,
    },
    Actualize {
        pool: String,
    },
}

/// Amounts of an `update_cover` event; omitted fields are zero
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct UpdateAmounts {
    pub add_capital: u64,
    pub remove_capital: u64,
    pub add_premium: u64,
    pub remove_premium: u64,
}

impl From<UpdateAmounts> for CoverUpdate {
    fn from(amounts: UpdateAmounts) -> Self {
        CoverUpdate {
            add_capital: amounts.add_capital.into(),
            remove_capital: amounts.remove_capital.into(),
            add_premium: amounts.add_premium.into(),
            remove_premium: amounts.remove_premium.into(),
        }
    }
}

impl Action {
    fn name(&self) -> &'static str {
        match self {
            Action::Deposit { .. } => "deposit",
            Action::AddLiquidity { .. } => "add_liquidity",
            Action::TakeInterest { .. } => "take_interest",
            Action::Withdraw { .. } => "withdraw",
            Action::OpenCover { .. } => "open_cover",
            Action::UpdateCover { .. } => "update_cover",
            Action::CloseCover { .. } => "close_cover",
            Action::Claim { .. } => "claim",
            Action::Actualize { .. } => "actualize",
        }
    }
}

/// What happened to one event
#[derive(Debug, Clone, Serialize)]
pub struct EventOutcome {
    pub at: DateTime<Utc>,
    pub action: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Final state of a replayed scenario
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub finished_at: DateTime<Utc>,
    pub events: Vec<EventOutcome>,
    pub pools: BTreeMap<String, PoolState>,
    /// Rewards each open position would settle at the end of the run
    pub positions: BTreeMap<String, RewardSettlement>,
    pub covers: BTreeMap<String, CoverView>,
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading scenario {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("parsing scenario {}", path.display()))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Registry plus the label tables of one run
pub struct Simulation {
    registry: Registry,
    stop_on_error: bool,
    pools: BTreeMap<String, PoolId>,
    positions: BTreeMap<String, PositionId>,
    covers: BTreeMap<String, CoverId>,
    now: u64,
}

impl Simulation {
    pub fn new(config: &SimConfig) -> Self {
        Self {
            registry: Registry::new(config.engine.clone()),
            stop_on_error: config.stop_on_error,
            pools: BTreeMap::new(),
            positions: BTreeMap::new(),
            covers: BTreeMap::new(),
            now: 0,
        }
    }

    /// Replay `scenario` from a fresh registry
    pub fn run(mut self, scenario: &Scenario) -> Result<Report> {
        let start = unix_seconds(scenario.start)?;
        self.now = start;
        for spec in &scenario.pools {
            self.create_pool(spec, start)?;
        }

        let mut events = Vec::with_capacity(scenario.events.len());
        for event in &scenario.events {
            let at = unix_seconds(event.at)?;
            if at < self.now {
                bail!("event at {} is earlier than the previous one", event.at);
            }
            self.now = at;

            let outcome = match self.apply(&event.action, at) {
                Ok(result) => {
                    debug!(action = event.action.name(), at = %event.at, "Event applied");
                    EventOutcome {
                        at: event.at,
                        action: event.action.name(),
                        result: Some(result),
                        error: None,
                    }
                }
                Err(e) if !self.stop_on_error => {
                    warn!(action = event.action.name(), at = %event.at, error = %e, "Event rejected");
                    EventOutcome {
                        at: event.at,
                        action: event.action.name(),
                        result: None,
                        error: Some(format!("{e:#}")),
                    }
                }
                Err(e) => return Err(e.context(format!("{} at {}", event.action.name(), event.at))),
            };
            events.push(outcome);
        }

        let finished_at = scenario
            .events
            .last()
            .map_or(scenario.start, |event| event.at);
        info!(events = events.len(), "Scenario replayed");
        self.report(finished_at, events)
    }

    fn create_pool(&mut self, spec: &PoolSpec, now: u64) -> Result<()> {
        let curve = match &spec.curve {
            Some(settings) => settings.to_curve(),
            None => self.registry.config().default_curve.to_curve(),
        }
        .with_context(|| format!("curve of pool {}", spec.name))?;

        let incompatible = spec
            .incompatible_with
            .iter()
            .map(|label| self.pool(label))
            .collect::<Result<Vec<_>>>()?;
        let id = self.registry.create_pool(curve, &incompatible, now)?;
        if self.pools.insert(spec.name.clone(), id).is_some() {
            bail!("pool {} declared twice", spec.name);
        }
        Ok(())
    }

    fn apply(&mut self, action: &Action, now: u64) -> Result<Value> {
        let result = match action {
            Action::Deposit {
                position,
                pools,
                amount,
            } => {
                if self.positions.contains_key(position) {
                    bail!("position {position} already exists");
                }
                let ids = pools
                    .iter()
                    .map(|label| self.pool(label))
                    .collect::<Result<Vec<_>>>()?;
                let id = self.registry.deposit(ids, u128::from(*amount), now)?;
                self.positions.insert(position.clone(), id);
                serde_json::to_value(id)?
            }
            Action::AddLiquidity { position, amount } => {
                let id = self.position(position)?;
                serde_json::to_value(self.registry.add_liquidity(id, u128::from(*amount), now)?)?
            }
            Action::TakeInterest { position } => {
                let id = self.position(position)?;
                serde_json::to_value(self.registry.take_interest(id, now)?)?
            }
            Action::Withdraw { position, amount } => {
                let id = self.position(position)?;
                let withdrawal = self.registry.withdraw(id, u128::from(*amount), now)?;
                if withdrawal.remaining_capital == 0 {
                    self.positions.remove(position);
                }
                serde_json::to_value(withdrawal)?
            }
            Action::OpenCover {
                cover,
                pool,
                capital,
                premium,
            } => {
                if self.covers.contains_key(cover) {
                    bail!("cover {cover} already exists");
                }
                let pool = self.pool(pool)?;
                let receipt = self
                    .registry
                    .open_cover(pool, u128::from(*capital), u128::from(*premium), now)?;
                self.covers.insert(cover.clone(), receipt.cover_id);
                serde_json::to_value(receipt)?
            }
            Action::UpdateCover { cover, update } => {
                let id = self.cover(cover)?;
                serde_json::to_value(self.registry.update_cover(id, (*update).into(), now)?)?
            }
            Action::CloseCover { cover } => {
                let id = self.cover(cover)?;
                serde_json::to_value(self.registry.close_cover(id, now)?)?
            }
            Action::Claim { pool, amount } => {
                let pool = self.pool(pool)?;
                serde_json::to_value(self.registry.record_claim(pool, u128::from(*amount), now)?)?
            }
            Action::Actualize { pool } => {
                let pool = self.pool(pool)?;
                serde_json::to_value(self.registry.actualize(pool, now)?)?
            }
        };
        Ok(result)
    }

    fn report(&self, finished_at: DateTime<Utc>, events: Vec<EventOutcome>) -> Result<Report> {
        let now = self.now;
        let mut pools = BTreeMap::new();
        for (label, id) in &self.pools {
            pools.insert(label.clone(), self.registry.preview_pool(*id, now)?);
        }
        let mut positions = BTreeMap::new();
        for (label, id) in &self.positions {
            positions.insert(label.clone(), self.registry.rewards_of(*id, now)?);
        }
        let mut covers = BTreeMap::new();
        for (label, id) in &self.covers {
            covers.insert(label.clone(), self.registry.cover_view(*id, now)?);
        }
        Ok(Report {
            finished_at,
            events,
            pools,
            positions,
            covers,
        })
    }

    fn pool(&self, label: &str) -> Result<PoolId> {
        self.pools
            .get(label)
            .copied()
            .ok_or_else(|| anyhow!("unknown pool {label}"))
    }

    fn position(&self, label: &str) -> Result<PositionId> {
        self.positions
            .get(label)
            .copied()
            .ok_or_else(|| anyhow!("unknown position {label}"))
    }

    fn cover(&self, label: &str) -> Result<CoverId> {
        self.covers
            .get(label)
            .copied()
            .ok_or_else(|| anyhow!("unknown cover {label}"))
    }
}

fn unix_seconds(at: DateTime<Utc>) -> Result<u64> {
    u64::try_from(at.timestamp()).map_err(|_| anyhow!("timestamp {at} is before the unix epoch"))
}
