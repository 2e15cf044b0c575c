//! Tierstake CLI
//!
//! Command-line tooling for ledger operators: validate a configuration,
//! look up the tier for an amount, and replay scenarios offline.

mod scenario;

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tierstake_core::{AccountId, Amount};
use tierstake_ledger::{LedgerConfig, RewardRateTable};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "tierstake")]
#[command(version = "0.1.0")]
#[command(about = "Tierstake - tiered staking and referral reward ledger", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and validate a ledger configuration
    CheckConfig {
        /// Configuration file path (TOML, or JSON by extension)
        #[arg(short, long, default_value = "tierstake.toml")]
        config: PathBuf,
    },

    /// Show the rate and lock period for a principal
    Tier {
        /// Configuration file path (TOML or JSON); defaults apply when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Principal to look up
        #[arg(short, long)]
        amount: Amount,

        /// Account label, to apply its investor override
        #[arg(long)]
        account: Option<String>,
    },

    /// Replay a JSON scenario against an in-memory ledger
    Simulate {
        /// Configuration file path (TOML or JSON); defaults apply when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Scenario file (JSON)
        #[arg(short, long)]
        scenario: PathBuf,
    },
}

fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn load_config(path: &Path) -> anyhow::Result<LedgerConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let parsed = match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => LedgerConfig::from_json_str(&content),
        _ => LedgerConfig::from_toml_str(&content),
    };
    let config = parsed.with_context(|| format!("loading config {}", path.display()))?;
    Ok(config)
}

fn load_config_or_default(path: Option<&Path>) -> anyhow::Result<LedgerConfig> {
    match path {
        Some(path) => load_config(path),
        None => {
            tracing::info!("No config given, using defaults");
            Ok(LedgerConfig::default())
        }
    }
}

fn print_config(config: &LedgerConfig) {
    println!("Tiers:");
    println!("  {:>20}  {:>8}  {:>6}", "threshold", "rate", "lock");
    for tier in &config.tiers {
        println!(
            "  {:>20}  {:>5}.{:02}%  {:>4} d",
            tier.threshold,
            tier.rate_bps / 100,
            tier.rate_bps % 100,
            tier.lock_days
        );
    }
    println!("Referral levels (bps): {:?}", config.level_rates_bps);
    println!(
        "Stake bounds: min {} max {}",
        config.min_stake,
        config
            .max_stake_position
            .map_or_else(|| "unbounded".to_string(), |m| m.to_string())
    );
    println!("Display unit: {}", config.display_unit);
    println!("Accrual month: {} days", config.days_per_accrual_month);
    println!(
        "Cooldowns (days): reinvest {} / claim reward {} / claim referral {} / sell {}",
        config.cooldowns.reinvest_days,
        config.cooldowns.claim_reward_days,
        config.cooldowns.claim_referral_reward_days,
        config.cooldowns.sell_days
    );
    println!(
        "Policies: {:?} / {:?} / {:?}",
        config.accrual_anchor, config.override_lock_policy, config.reinvest_policy
    );
    if let Some(stop) = config.reward_stop_time {
        println!("Rewards stop at: {}", stop);
    }
    for (id, instrument) in &config.instruments {
        println!(
            "Instrument {}: price {} min purchase {}",
            id, instrument.price, instrument.min_purchase
        );
    }
    println!("Investor overrides: {}", config.investor_rates.len());
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::CheckConfig { config } => {
            let ledger_config = load_config(&config)?;
            tracing::info!("Config {:?} is valid", config);
            print_config(&ledger_config);
        }

        Commands::Tier {
            config,
            amount,
            account,
        } => {
            let ledger_config = load_config_or_default(config.as_deref())?;
            let table = RewardRateTable::from_config(&ledger_config)?;
            let investor = account
                .as_deref()
                .map(AccountId::from_label)
                .and_then(|id| ledger_config.investor_rates.get(&id));
            let quote = table.lookup(amount, investor);
            println!("Principal: {}", amount);
            println!(
                "Rate: {} bps ({}.{:02}% per month)",
                quote.rate_bps,
                quote.rate_bps / 100,
                quote.rate_bps % 100
            );
            println!("Lock: {} days", quote.lock_days);
            if investor.is_some() {
                println!("(investor override applied)");
            }
        }

        Commands::Simulate {
            config,
            scenario: scenario_path,
        } => {
            let ledger_config = load_config_or_default(config.as_deref())?;
            let content = std::fs::read_to_string(&scenario_path)
                .with_context(|| format!("reading scenario {}", scenario_path.display()))?;
            let parsed: scenario::Scenario = serde_json::from_str(&content)
                .with_context(|| format!("parsing scenario {}", scenario_path.display()))?;
            tracing::info!("Replaying {} steps from {:?}", parsed.steps.len(), scenario_path);
            let report = scenario::run(ledger_config, parsed)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
