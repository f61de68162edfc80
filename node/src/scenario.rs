//! # Scenario Replay
//!
//! A scenario is a JSON document describing a vault's starting world (price
//! quote, custody fees, external holdings, role grants) and a list of steps
//! to run against it. Replaying builds a [`CustodyVault`] over in-memory
//! collaborators, executes every step in order and reports each outcome.
//! A rejected step is an outcome, not a failure of the replay.
//!
//! Principals are named by label (`"alice"`) or by 64-character hex
//! address. Assets are named by symbol (`"USDC"`), by hex id, or as
//! `"NATIVE"` for the native asset.
//!
//! ```json
//! {
//!   "admin": "admin",
//!   "price": { "answer": 250000000000, "decimals": 8 },
//!   "holders": [{ "holder": "alice", "asset": "USDC", "amount": 1000 }],
//!   "steps": [
//!     { "set_capacity": { "caller": "admin", "asset": "USDC", "capacity": { "limited": 1000 } } },
//!     { "deposit": { "caller": "alice", "asset": "USDC", "amount": 600 } }
//!   ]
//! }
//! ```

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use strongbox_contracts::{CustodyVault, VaultSnapshot};
use strongbox_protocol::access::{AccessControl, Role};
use strongbox_protocol::config::VaultConfig;
use strongbox_protocol::custody::InMemoryCustody;
use strongbox_protocol::ledger::{Address, Amount, AssetId, Capacity};
use strongbox_protocol::oracle::{FixedPriceFeed, OracleError, RawQuote};
use strongbox_protocol::{LedgerError, LedgerResult};

use crate::metrics::NodeMetrics;

// ---------------------------------------------------------------------------
// Scenario Document
// ---------------------------------------------------------------------------

/// A replayable vault scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Vault configuration. Defaults apply when omitted.
    #[serde(default)]
    pub config: Option<VaultConfig>,
    /// Label of the bootstrap administrator.
    pub admin: String,
    /// Initial native price quote.
    pub price: PriceSpec,
    /// Per-asset transfer fees.
    #[serde(default)]
    pub fees: Vec<FeeSpec>,
    /// External holdings available for deposits.
    #[serde(default)]
    pub holders: Vec<HolderSpec>,
    /// Roles granted by the administrator before any step runs.
    #[serde(default)]
    pub roles: Vec<RoleSpec>,
    /// Steps to execute, in order.
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// A price quote relative to replay time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceSpec {
    /// Raw feed answer.
    pub answer: i128,
    /// Decimals of `answer`.
    #[serde(default = "default_decimals")]
    pub decimals: u8,
    /// How old the quote is when published.
    #[serde(default)]
    pub age_secs: i64,
}

fn default_decimals() -> u8 {
    8
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeSpec {
    pub asset: String,
    pub bps: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HolderSpec {
    pub holder: String,
    pub asset: String,
    pub amount: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleSpec {
    pub principal: String,
    pub role: Role,
}

/// One step of a scenario.
///
/// Vault operations map one-to-one onto [`CustodyVault`] methods. The
/// remaining steps act on the simulated world around the vault.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Deposit {
        caller: String,
        asset: String,
        amount: Amount,
    },
    Withdraw {
        caller: String,
        asset: String,
        amount: Amount,
    },
    SetCapacity {
        caller: String,
        asset: String,
        capacity: Capacity,
    },
    SetPriceFeed {
        caller: String,
        label: String,
        price: PriceSpec,
    },
    GrantRole {
        caller: String,
        principal: String,
        role: Role,
    },
    RevokeRole {
        caller: String,
        principal: String,
        role: Role,
    },
    Reassign {
        operator: String,
        from: String,
        to: String,
        asset: String,
        amount: Amount,
    },
    AssignExcess {
        operator: String,
        to: String,
        asset: String,
        amount: Amount,
    },
    AdminTopUp {
        operator: String,
        principal: String,
        asset: String,
        amount: Amount,
    },
    AdminWithdrawFrom {
        operator: String,
        from: String,
        destination: String,
        asset: String,
        amount: Amount,
    },
    /// Publishes a new answer on the current feed.
    PushPrice(PriceSpec),
    /// Sends value straight into custody, bypassing the vault.
    SideTransfer {
        holder: String,
        asset: String,
        amount: Amount,
    },
    /// Makes custody refuse (or accept again) outbound transfers.
    HaltOutbound { halted: bool },
}

impl Step {
    /// Snake-case name of the step.
    pub fn action(&self) -> &'static str {
        match self {
            Step::Deposit { .. } => "deposit",
            Step::Withdraw { .. } => "withdraw",
            Step::SetCapacity { .. } => "set_capacity",
            Step::SetPriceFeed { .. } => "set_price_feed",
            Step::GrantRole { .. } => "grant_role",
            Step::RevokeRole { .. } => "revoke_role",
            Step::Reassign { .. } => "reassign",
            Step::AssignExcess { .. } => "assign_excess",
            Step::AdminTopUp { .. } => "admin_top_up",
            Step::AdminWithdrawFrom { .. } => "admin_withdraw_from",
            Step::PushPrice(_) => "push_price",
            Step::SideTransfer { .. } => "side_transfer",
            Step::HaltOutbound { .. } => "halt_outbound",
        }
    }
}

// ---------------------------------------------------------------------------
// Name Resolution
// ---------------------------------------------------------------------------

/// Resolves a principal name: a 64-character hex address, or a label.
pub fn parse_principal(name: &str) -> Address {
    if name.len() == 64 {
        if let Ok(addr) = Address::from_hex(name) {
            return addr;
        }
    }
    Address::from_label(name)
}

/// Resolves an asset name: `NATIVE`, a 64-character hex id, or a symbol.
pub fn parse_asset(name: &str) -> AssetId {
    if name.eq_ignore_ascii_case("native") {
        return AssetId::NATIVE;
    }
    if name.len() == 64 {
        if let Ok(id) = AssetId::from_hex(name) {
            return id;
        }
    }
    AssetId::derive(name)
}

impl PriceSpec {
    /// The quote this spec describes, observed `age_secs` before now.
    ///
    /// An age that puts the observation time outside the representable
    /// range is an invalid quote.
    pub fn quote(&self, seq: u64) -> Result<RawQuote, OracleError> {
        let observed_at = Duration::try_seconds(self.age_secs)
            .and_then(|age| Utc::now().checked_sub_signed(age))
            .ok_or_else(|| {
                OracleError::Invalid(format!("quote age of {}s is out of range", self.age_secs))
            })?;
        Ok(RawQuote::settled(self.answer, self.decimals, observed_at, seq))
    }
}

// ---------------------------------------------------------------------------
// Replay
// ---------------------------------------------------------------------------

/// Result of one step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepOutcome {
    /// Position in the scenario, from 0.
    pub index: usize,
    /// Step name.
    pub action: String,
    /// Whether the step committed.
    pub ok: bool,
    /// Amount returned by the operation, where it returns one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Amount>,
    /// Rejection reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// What `replay` prints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayReport {
    pub steps: Vec<StepOutcome>,
    pub snapshot: VaultSnapshot,
}

impl ReplayReport {
    /// Number of rejected steps.
    pub fn rejected(&self) -> usize {
        self.steps.iter().filter(|s| !s.ok).count()
    }
}

/// A vault plus the simulated world it runs in.
pub struct ReplayEnv {
    pub vault: CustodyVault,
    pub custody: Arc<InMemoryCustody>,
    pub feed: Arc<FixedPriceFeed>,
    next_seq: u64,
}

impl std::fmt::Debug for ReplayEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplayEnv")
            .field("vault", &self.vault)
            .field("next_seq", &self.next_seq)
            .finish()
    }
}

impl Scenario {
    /// Reads a scenario from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse scenario {}", path.display()))
    }

    /// Builds the vault and its world. `config` overrides the scenario's own.
    pub fn build(&self, config: Option<VaultConfig>) -> Result<ReplayEnv> {
        let config = config.or_else(|| self.config.clone()).unwrap_or_default();
        let admin = parse_principal(&self.admin);

        let custody = Arc::new(InMemoryCustody::new());
        for fee in &self.fees {
            custody.set_transfer_fee_bps(parse_asset(&fee.asset), fee.bps);
        }
        for h in &self.holders {
            custody.fund_external(parse_principal(&h.holder), parse_asset(&h.asset), h.amount);
        }

        let quote = self.price.quote(1).context("invalid scenario price")?;
        let feed = Arc::new(FixedPriceFeed::new("scenario", quote));
        let access = AccessControl::new(admin).context("invalid administrator")?;
        let mut vault = CustodyVault::new(config, access, feed.clone(), custody.clone())
            .context("failed to construct vault")?;

        for grant in &self.roles {
            vault
                .grant_role(admin, parse_principal(&grant.principal), grant.role)
                .with_context(|| format!("failed to grant {} to {}", grant.role, grant.principal))?;
        }

        Ok(ReplayEnv {
            vault,
            custody,
            feed,
            next_seq: 2,
        })
    }
}

impl ReplayEnv {
    /// Runs every step of `scenario`, recording outcomes in `metrics`.
    pub fn run(&mut self, scenario: &Scenario, metrics: &NodeMetrics) -> ReplayReport {
        let mut steps = Vec::with_capacity(scenario.steps.len());
        for (index, step) in scenario.steps.iter().enumerate() {
            let started = Instant::now();
            let result = self.apply(step);
            metrics.record_step(step.action(), result.is_ok(), started.elapsed());

            let outcome = match result {
                Ok(value) => StepOutcome {
                    index,
                    action: step.action().to_string(),
                    ok: true,
                    value,
                    error: None,
                },
                Err(err) => {
                    tracing::info!(index, action = step.action(), error = %err, "step rejected");
                    StepOutcome {
                        index,
                        action: step.action().to_string(),
                        ok: false,
                        value: None,
                        error: Some(err.to_string()),
                    }
                }
            };
            steps.push(outcome);
        }

        let snapshot = self.vault.snapshot();
        metrics.observe_snapshot(&snapshot);
        ReplayReport { steps, snapshot }
    }

    fn apply(&mut self, step: &Step) -> LedgerResult<Option<Amount>> {
        let v = &mut self.vault;
        match step {
            Step::Deposit {
                caller,
                asset,
                amount,
            } => v
                .deposit(parse_principal(caller), parse_asset(asset), *amount)
                .map(Some),
            Step::Withdraw {
                caller,
                asset,
                amount,
            } => v
                .withdraw(parse_principal(caller), parse_asset(asset), *amount)
                .map(Some),
            Step::SetCapacity {
                caller,
                asset,
                capacity,
            } => v
                .set_capacity(parse_principal(caller), parse_asset(asset), *capacity)
                .map(|_| None),
            Step::SetPriceFeed {
                caller,
                label,
                price,
            } => {
                let feed = Arc::new(FixedPriceFeed::new(label.clone(), price.quote(1)?));
                v.set_price_feed(parse_principal(caller), feed.clone())?;
                self.feed = feed;
                self.next_seq = 2;
                Ok(None)
            }
            Step::GrantRole {
                caller,
                principal,
                role,
            } => v
                .grant_role(parse_principal(caller), parse_principal(principal), *role)
                .map(|_| None),
            Step::RevokeRole {
                caller,
                principal,
                role,
            } => v
                .revoke_role(parse_principal(caller), parse_principal(principal), *role)
                .map(|_| None),
            Step::Reassign {
                operator,
                from,
                to,
                asset,
                amount,
            } => v
                .reassign(
                    parse_principal(operator),
                    parse_principal(from),
                    parse_principal(to),
                    parse_asset(asset),
                    *amount,
                )
                .map(|_| None),
            Step::AssignExcess {
                operator,
                to,
                asset,
                amount,
            } => v
                .assign_excess(
                    parse_principal(operator),
                    parse_principal(to),
                    parse_asset(asset),
                    *amount,
                )
                .map(Some),
            Step::AdminTopUp {
                operator,
                principal,
                asset,
                amount,
            } => v
                .admin_top_up(
                    parse_principal(operator),
                    parse_principal(principal),
                    parse_asset(asset),
                    *amount,
                )
                .map(Some),
            Step::AdminWithdrawFrom {
                operator,
                from,
                destination,
                asset,
                amount,
            } => v
                .admin_withdraw_from(
                    parse_principal(operator),
                    parse_principal(from),
                    parse_principal(destination),
                    parse_asset(asset),
                    *amount,
                )
                .map(Some),
            Step::PushPrice(spec) => {
                self.feed.set_quote(spec.quote(self.next_seq)?);
                self.next_seq += 1;
                Ok(None)
            }
            Step::SideTransfer {
                holder,
                asset,
                amount,
            } => self
                .custody
                .side_transfer(parse_principal(holder), parse_asset(asset), *amount)
                .map(Some)
                .map_err(LedgerError::from),
            Step::HaltOutbound { halted } => {
                self.custody.halt_outbound(*halted);
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CAPACITY_SCENARIO: &str = r#"{
        "admin": "admin",
        "price": { "answer": 250000000000 },
        "holders": [{ "holder": "alice", "asset": "USDC", "amount": 2000 }],
        "steps": [
            { "set_capacity": { "caller": "admin", "asset": "USDC", "capacity": { "limited": 1000 } } },
            { "deposit": { "caller": "alice", "asset": "USDC", "amount": 600 } },
            { "deposit": { "caller": "alice", "asset": "USDC", "amount": 500 } }
        ]
    }"#;

    fn replay(json: &str) -> (ReplayEnv, ReplayReport) {
        let scenario: Scenario = serde_json::from_str(json).unwrap();
        let metrics = NodeMetrics::new().unwrap();
        let mut env = scenario.build(None).unwrap();
        let report = env.run(&scenario, &metrics);
        (env, report)
    }

    #[test]
    fn capacity_scenario_reports_rejection() {
        let (env, report) = replay(CAPACITY_SCENARIO);

        assert_eq!(report.steps.len(), 3);
        assert!(report.steps[0].ok);
        assert_eq!(report.steps[1].value, Some(600));
        assert!(!report.steps[2].ok);
        assert_eq!(
            report.steps[2].error.as_deref(),
            Some("capacity exceeded: available 400, requested 500")
        );
        assert_eq!(report.rejected(), 1);
        assert_eq!(env.vault.total_of(&AssetId::derive("USDC")), 600);
    }

    #[test]
    fn pushed_stale_price_blocks_withdrawal() {
        let (_, report) = replay(
            r#"{
                "admin": "admin",
                "price": { "answer": 250000000000 },
                "holders": [{ "holder": "alice", "asset": "NATIVE", "amount": 1000000000000000000 }],
                "steps": [
                    { "deposit": { "caller": "alice", "asset": "NATIVE", "amount": 1000000000000000000 } },
                    { "push_price": { "answer": 250000000000, "age_secs": 7200 } },
                    { "withdraw": { "caller": "alice", "asset": "NATIVE", "amount": 1000 } }
                ]
            }"#,
        );
        assert!(report.steps[0].ok);
        assert!(report.steps[1].ok);
        assert!(!report.steps[2].ok);
        assert!(report.steps[2]
            .error
            .as_deref()
            .unwrap()
            .starts_with("stale price"));
    }

    #[test]
    fn out_of_range_price_age_is_an_error() {
        let scenario: Scenario = serde_json::from_str(
            r#"{ "admin": "admin", "price": { "answer": 1, "age_secs": 9223372036854775807 } }"#,
        )
        .unwrap();
        let err = scenario.build(None).unwrap_err();
        assert!(err.to_string().contains("invalid scenario price"));

        let (_, report) = replay(
            r#"{
                "admin": "admin",
                "price": { "answer": 250000000000 },
                "steps": [
                    { "push_price": { "answer": 250000000000, "age_secs": -9223372036854775807 } }
                ]
            }"#,
        );
        assert!(!report.steps[0].ok);
        assert!(report.steps[0]
            .error
            .as_deref()
            .unwrap()
            .contains("out of range"));
    }

    #[test]
    fn side_transfer_then_assign_excess() {
        let (env, report) = replay(
            r#"{
                "admin": "admin",
                "price": { "answer": 250000000000 },
                "holders": [{ "holder": "stray", "asset": "USDC", "amount": 300 }],
                "roles": [{ "principal": "ops", "role": "recovery" }],
                "steps": [
                    { "side_transfer": { "holder": "stray", "asset": "USDC", "amount": 300 } },
                    { "assign_excess": { "operator": "ops", "to": "stray", "asset": "USDC", "amount": 300 } }
                ]
            }"#,
        );
        assert!(report.steps.iter().all(|s| s.ok));
        assert_eq!(
            env.vault
                .my_balance(&Address::from_label("stray"), &AssetId::derive("USDC")),
            300
        );
        assert_eq!(env.vault.counters().recovery_count, 1);
    }

    #[test]
    fn names_resolve_to_handles() {
        let alice = Address::from_label("alice");
        assert_eq!(parse_principal("alice"), alice);
        assert_eq!(parse_principal(&alice.to_hex()), alice);
        assert_eq!(parse_asset("native"), AssetId::NATIVE);
        assert_eq!(parse_asset("usdc"), AssetId::derive("USDC"));
        let usdc = AssetId::derive("USDC");
        assert_eq!(parse_asset(&usdc.to_hex()), usdc);
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CAPACITY_SCENARIO.as_bytes()).unwrap();
        let scenario = Scenario::load(file.path()).unwrap();
        assert_eq!(scenario.steps.len(), 3);
        assert_eq!(scenario.steps[1].action(), "deposit");
    }

    #[test]
    fn load_reports_missing_file() {
        let err = Scenario::load(Path::new("/nonexistent/scenario.json")).unwrap_err();
        assert!(err.to_string().contains("failed to read scenario"));
    }
}
