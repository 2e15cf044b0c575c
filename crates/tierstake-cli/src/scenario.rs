//! Scenario replay
//!
//! A scenario is a JSON list of timed steps replayed against an in-memory
//! engine driven by a `ManualClock`. Accounts are named by label and mapped
//! to ids with `AccountId::from_label`. Rejected steps are reported, not
//! fatal, so a scenario can assert on failures too.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tierstake_core::{amount_serde, AccountId, Amount, ManualClock, Timestamp};
use tierstake_ledger::{
    Allocation, AllowAll, GlobalAggregates, LedgerConfig, LedgerEvent, RecordingTransfer,
    StakingEngine, StakingPosition, TransferRecord,
};

/// Default start time: 2024-01-01T00:00:00Z
fn default_start() -> Timestamp {
    1_704_067_200
}

#[derive(Debug, Deserialize)]
pub struct Scenario {
    #[serde(default = "default_start")]
    pub start: Timestamp,
    pub steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Advance {
        #[serde(default)]
        days: i64,
        #[serde(default)]
        seconds: i64,
    },
    Stake {
        account: String,
        #[serde(with = "amount_serde")]
        amount: Amount,
        #[serde(default)]
        referrer: Option<String>,
    },
    Reinvest {
        account: String,
        #[serde(with = "amount_serde")]
        amount: Amount,
    },
    Claim {
        account: String,
        #[serde(with = "amount_serde")]
        amount: Amount,
    },
    ClaimReward {
        account: String,
        #[serde(with = "amount_serde")]
        amount: Amount,
    },
    ClaimReferralReward {
        account: String,
        #[serde(with = "amount_serde")]
        amount: Amount,
    },
    Sell {
        account: String,
        #[serde(with = "amount_serde")]
        amount: Amount,
        allocations: Vec<Allocation>,
    },
    Register {
        account: String,
        referrer: String,
    },
    Unlink {
        account: String,
    },
}

impl Step {
    fn name(&self) -> &'static str {
        match self {
            Self::Advance { .. } => "advance",
            Self::Stake { .. } => "stake",
            Self::Reinvest { .. } => "reinvest",
            Self::Claim { .. } => "claim",
            Self::ClaimReward { .. } => "claim_reward",
            Self::ClaimReferralReward { .. } => "claim_referral_reward",
            Self::Sell { .. } => "sell",
            Self::Register { .. } => "register",
            Self::Unlink { .. } => "unlink",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StepOutcome {
    pub index: usize,
    pub op: &'static str,
    pub at: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct AccountReport {
    #[serde(flatten)]
    pub position: StakingPosition,
    pub preview_reward: Amount,
    pub preview_referral_reward: Amount,
    pub referrer: Option<String>,
    pub active_referees: usize,
}

#[derive(Debug, Serialize)]
pub struct Report {
    pub finished_at: Timestamp,
    pub steps: Vec<StepOutcome>,
    pub accounts: BTreeMap<String, AccountReport>,
    pub aggregates: GlobalAggregates,
    pub weighted_average_rate_bps: u32,
    pub transfers: Vec<TransferRecord>,
    pub events: Vec<LedgerEvent>,
}

/// Label registry so reports can name accounts the way the scenario did
#[derive(Default)]
struct Labels {
    by_id: BTreeMap<AccountId, String>,
}

impl Labels {
    fn id(&mut self, label: &str) -> AccountId {
        let id = AccountId::from_label(label);
        self.by_id.entry(id).or_insert_with(|| label.to_string());
        id
    }

    fn label(&self, id: &AccountId) -> String {
        self.by_id.get(id).cloned().unwrap_or_else(|| id.to_hex())
    }
}

/// Replay `scenario` against a fresh engine built from `config`
pub fn run(config: LedgerConfig, scenario: Scenario) -> anyhow::Result<Report> {
    let clock = Arc::new(ManualClock::new(scenario.start));
    let transfer = Arc::new(RecordingTransfer::new());
    let engine = StakingEngine::new(config, clock.clone(), transfer.clone(), Arc::new(AllowAll))?;
    let mut labels = Labels::default();
    let admin = labels.id("admin");

    let mut outcomes = Vec::with_capacity(scenario.steps.len());
    for (index, step) in scenario.steps.into_iter().enumerate() {
        let op = step.name();
        let result = match step {
            Step::Advance { days, seconds } => {
                clock.advance_days(days);
                clock.advance(seconds);
                Ok(())
            }
            Step::Stake {
                account,
                amount,
                referrer,
            } => {
                let referrer = referrer.map(|r| labels.id(&r));
                engine.stake(labels.id(&account), amount, referrer)
            }
            Step::Reinvest { account, amount } => engine.reinvest(labels.id(&account), amount),
            Step::Claim { account, amount } => engine.claim(labels.id(&account), amount),
            Step::ClaimReward { account, amount } => {
                engine.claim_reward(labels.id(&account), amount).map(|_| ())
            }
            Step::ClaimReferralReward { account, amount } => engine
                .claim_referral_reward(labels.id(&account), amount)
                .map(|_| ()),
            Step::Sell {
                account,
                amount,
                allocations,
            } => engine.sell(labels.id(&account), amount, &allocations).map(|_| ()),
            Step::Register { account, referrer } => {
                let referrer = labels.id(&referrer);
                engine.register_referral(labels.id(&account), referrer)
            }
            Step::Unlink { account } => engine.unlink(&admin, labels.id(&account)).map(|_| ()),
        };
        outcomes.push(StepOutcome {
            index,
            op,
            at: engine.now(),
            code: result.as_ref().err().map(|e| e.code()),
            error: result.err().map(|e| e.to_string()),
        });
    }

    let mut accounts = BTreeMap::new();
    for (id, position) in engine.positions() {
        let node = engine.referral_node(&id);
        accounts.insert(
            labels.label(&id),
            AccountReport {
                position,
                preview_reward: engine.preview_reward(&id),
                preview_referral_reward: engine.preview_referral_reward(&id),
                referrer: node.parent.map(|p| labels.label(&p)),
                active_referees: engine.active_referee_count(&id),
            },
        );
    }
    let aggregates = engine.aggregates();
    Ok(Report {
        finished_at: engine.now(),
        steps: outcomes,
        accounts,
        weighted_average_rate_bps: aggregates.weighted_average_rate_bps(),
        aggregates,
        transfers: transfer.records(),
        events: engine.drain_events(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &str = r#"{
        "start": 0,
        "steps": [
            { "op": "stake", "account": "alice", "amount": 3000000 },
            { "op": "stake", "account": "bob", "amount": 3000000, "referrer": "alice" },
            { "op": "advance", "days": 30 },
            { "op": "claim_reward", "account": "bob", "amount": 240000 },
            { "op": "claim_reward", "account": "bob", "amount": 1 },
            { "op": "claim_referral_reward", "account": "alice", "amount": "24000" }
        ]
    }"#;

    #[test]
    fn test_scenario_replay() {
        let scenario: Scenario = serde_json::from_str(SCENARIO).unwrap();
        let report = run(LedgerConfig::default(), scenario).unwrap();

        assert_eq!(report.finished_at, 30 * 86_400);
        assert!(report.steps[3].error.is_none());
        // second claim inside the cooldown window
        assert_eq!(report.steps[4].code, Some(2002));
        assert!(report.steps[5].error.is_none());

        let bob = &report.accounts["bob"];
        assert_eq!(bob.referrer.as_deref(), Some("alice"));
        assert_eq!(bob.position.pending_reward, 0);
        assert_eq!(report.accounts["alice"].active_referees, 1);
        assert_eq!(report.accounts["alice"].position.daily_referral_inflow_rate, 800);
        assert_eq!(report.weighted_average_rate_bps, 800);
        assert_eq!(report.transfers.len(), 4);
    }
}
