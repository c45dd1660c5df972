//! `diamond-cut` command line

mod prompt;

use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use diamond_artifact::{decode_hex, Address};
use diamond_catalog::{ArtifactCatalog, BuildInfoCache, CatalogBuilder};
use diamond_cut::{
    AlwaysConfirm, Confirmation, CutOptions, CutOrchestrator, EngineConfig, GitWorkingTree, InitCall,
};
use diamond_diff::{UpgradePlan, WorkingTree};
use diamond_rpc::JsonRpcLedger;
use diamond_snapshot::{LedgerReader, SnapshotCapturer, SnapshotStore};
use prompt::TerminalConfirmation;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

const SIGNERS: [&str; 1] = ["unlocked"];

fn cli() -> Command {
    let diamond = || {
        Arg::new("diamond")
            .long("diamond")
            .required(true)
            .value_parser(value_parser!(Address))
            .help("Diamond proxy address")
    };

    Command::new("diamond-cut")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Diff and safely cut a diamond proxy")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .default_value("diamond.toml")
                .value_parser(value_parser!(PathBuf))
                .help("Engine configuration file"),
        )
        .arg(
            Arg::new("network")
                .long("network")
                .global(true)
                .help("Network label, overrides the config"),
        )
        .arg(
            Arg::new("rpc-url")
                .long("rpc-url")
                .global(true)
                .help("JSON-RPC endpoint, overrides config and DIAMOND_RPC_URL"),
        )
        .arg(
            Arg::new("production")
                .long("production")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Treat the network as production"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand(
            Command::new("catalog").about("List compiled facets").arg(
                Arg::new("artifacts")
                    .long("artifacts")
                    .value_parser(value_parser!(PathBuf))
                    .help("Artifact directory, overrides the config"),
            ),
        )
        .subcommand(
            Command::new("capture")
                .about("Capture the live state of a diamond")
                .arg(diamond())
                .arg(
                    Arg::new("record")
                        .long("record")
                        .action(ArgAction::SetTrue)
                        .help("Append the snapshot to history"),
                ),
        )
        .subcommand(
            Command::new("history")
                .about("List and verify stored snapshots")
                .arg(diamond())
                .arg(
                    Arg::new("chain-id")
                        .long("chain-id")
                        .value_parser(value_parser!(u64))
                        .help("Chain id; asked from the ledger when absent"),
                ),
        )
        .subcommand(
            Command::new("upgrade")
                .about("Diff, validate and apply an upgrade plan")
                .arg(diamond())
                .arg(
                    Arg::new("owner")
                        .long("owner")
                        .required(true)
                        .value_parser(value_parser!(Address))
                        .help("Diamond owner; sends every transaction"),
                )
                .arg(
                    Arg::new("plan")
                        .long("plan")
                        .required(true)
                        .help("Upgrade plan: a JSON file or inline JSON"),
                )
                .arg(
                    Arg::new("init-address")
                        .long("init-address")
                        .value_parser(value_parser!(Address))
                        .help("Initializer called after the cut"),
                )
                .arg(
                    Arg::new("init-calldata")
                        .long("init-calldata")
                        .requires("init-address")
                        .help("Hex calldata for the initializer"),
                )
                .arg(
                    Arg::new("signer")
                        .long("signer")
                        .default_value("unlocked")
                        .value_parser(SIGNERS)
                        .help("How transactions are signed"),
                )
                .arg(
                    Arg::new("report-only")
                        .long("report-only")
                        .action(ArgAction::SetTrue)
                        .help("Stop after the diff report"),
                )
                .arg(
                    Arg::new("fresh")
                        .long("fresh")
                        .action(ArgAction::SetTrue)
                        .help("First deployment: emit no Replace instructions"),
                )
                .arg(
                    Arg::new("yes")
                        .long("yes")
                        .action(ArgAction::SetTrue)
                        .help("Skip the production confirmation prompt"),
                ),
        )
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(matches: &ArgMatches) -> Result<EngineConfig> {
    let path = matches
        .get_one::<PathBuf>("config")
        .map_or_else(|| PathBuf::from("diamond.toml"), Clone::clone);
    let mut config = EngineConfig::load(&path)?;
    if let Some(network) = matches.get_one::<String>("network") {
        config = config.with_network(network.clone());
    }
    if let Some(url) = matches.get_one::<String>("rpc-url") {
        config = config.with_rpc_url(url.clone());
    }
    if matches.get_flag("production") {
        config = config.with_production(true);
    }
    Ok(config)
}

async fn build_catalog(dir: &Path) -> Result<ArtifactCatalog> {
    let cache = BuildInfoCache::default();
    let build = CatalogBuilder::new(dir, &cache)
        .build()
        .await
        .with_context(|| format!("building catalog from {}", dir.display()))?;
    for skipped in &build.skipped {
        tracing::debug!(path = %skipped.path.display(), reason = %skipped.reason, "skipped artifact");
    }
    Ok(build.catalog)
}

/// Plan from a file path, else inline JSON
async fn read_plan(arg: &str) -> Result<UpgradePlan> {
    let text = match tokio::fs::read_to_string(arg).await {
        Ok(text) => text,
        Err(_) if arg.trim_start().starts_with('[') => arg.to_string(),
        Err(e) => return Err(e).with_context(|| format!("reading plan {arg}")),
    };
    UpgradePlan::from_json(&text).context("parsing upgrade plan")
}

fn diamond_arg(args: &ArgMatches) -> Result<Address> {
    args.get_one::<Address>("diamond")
        .copied()
        .context("--diamond is required")
}

async fn catalog_cmd(config: &EngineConfig, args: &ArgMatches) -> Result<()> {
    let dir = args
        .get_one::<PathBuf>("artifacts")
        .cloned()
        .unwrap_or_else(|| config.paths.artifacts.clone());
    let catalog = build_catalog(&dir).await?;
    for entry in catalog.iter() {
        let facet = &entry.implementation;
        println!(
            "{:<32} {:>3} selectors {:>3} routines  {}{}",
            facet.name,
            facet.selectors().len(),
            facet.internal_routines.len(),
            facet.source_name,
            if entry.has_ast { "" } else { "  (no AST)" }
        );
    }
    Ok(())
}

async fn capture_cmd(config: &EngineConfig, args: &ArgMatches) -> Result<()> {
    let diamond = diamond_arg(args)?;
    let catalog = build_catalog(&config.paths.artifacts).await?;
    let ledger = JsonRpcLedger::from_config(config);
    let tree = GitWorkingTree::new(".");
    let revision = tree.head_revision().await.ok().flatten();

    let snapshot = SnapshotCapturer::new(&ledger, &catalog, config.network.name.clone())
        .with_git_commit(revision)
        .capture(diamond)
        .await?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);

    if args.get_flag("record") {
        let entry = SnapshotStore::new(&config.paths.snapshots)
            .append(&snapshot)
            .await?;
        eprintln!("recorded as entry {} ({})", entry.sequence, entry.hash.short());
    }
    Ok(())
}

async fn history_cmd(config: &EngineConfig, args: &ArgMatches) -> Result<()> {
    let diamond = diamond_arg(args)?;
    let chain_id = match args.get_one::<u64>("chain-id") {
        Some(id) => *id,
        None => JsonRpcLedger::from_config(config).chain_id().await?,
    };
    let store = SnapshotStore::new(&config.paths.snapshots);
    let history = store.history(chain_id, &diamond).await?;
    if history.is_empty() {
        println!("no snapshots recorded for {diamond} on chain {chain_id}");
        return Ok(());
    }
    for entry in &history {
        let s = &entry.snapshot;
        println!(
            "#{:<4} block {:<10} {:<25} {} facets {:>4} selectors  {}  {}",
            entry.sequence,
            s.block_number,
            entry.recorded_at,
            s.facets.len(),
            s.selector_count(),
            entry.hash.short(),
            s.git_commit.as_deref().unwrap_or("-"),
        );
    }
    let verified = store.verify_history(chain_id, &diamond).await?;
    println!("history intact: {verified} entries");
    Ok(())
}

async fn upgrade_cmd(config: &EngineConfig, args: &ArgMatches) -> Result<()> {
    let diamond = diamond_arg(args)?;
    let owner = *args.get_one::<Address>("owner").context("--owner is required")?;
    let plan_arg = args.get_one::<String>("plan").context("--plan is required")?;
    let plan = read_plan(plan_arg).await?;

    let init = match args.get_one::<Address>("init-address") {
        Some(address) => InitCall {
            address: *address,
            calldata: match args.get_one::<String>("init-calldata") {
                Some(hex) => decode_hex(hex).context("decoding --init-calldata")?,
                None => Vec::new(),
            },
        },
        None => InitCall::none(),
    };
    if args
        .get_one::<String>("signer")
        .is_some_and(|s| !SIGNERS.contains(&s.as_str()))
    {
        bail!("unsupported signer");
    }

    let catalog = build_catalog(&config.paths.artifacts).await?;
    let store = SnapshotStore::new(&config.paths.snapshots);
    let ledger = JsonRpcLedger::from_config(config);
    let tree = GitWorkingTree::new(".");
    let confirmation: &dyn Confirmation = if args.get_flag("yes") {
        &AlwaysConfirm
    } else {
        &TerminalConfirmation
    };

    let options = CutOptions::new(diamond, owner, plan)
        .with_init(init)
        .with_report_only(args.get_flag("report-only"))
        .with_fresh_deployment(args.get_flag("fresh"));

    let outcome = CutOrchestrator::new(&catalog, &store, &ledger, &tree)
        .with_config(config)
        .with_confirmation(confirmation)
        .run(&options)
        .await?;

    println!("{}", outcome.report.summary);
    if let Some(receipt) = &outcome.receipt {
        println!("cut {} in block {:?}", receipt.tx_hash, receipt.block_number);
    }
    for (name, address) in &outcome.deployed {
        println!("deployed {name} at {address}");
    }
    println!("finished in state {}", outcome.state);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));
    let config = load_config(&matches)?;

    match matches.subcommand() {
        Some(("catalog", args)) => catalog_cmd(&config, args).await,
        Some(("capture", args)) => capture_cmd(&config, args).await,
        Some(("history", args)) => history_cmd(&config, args).await,
        Some(("upgrade", args)) => upgrade_cmd(&config, args).await,
        _ => bail!("unknown command"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_definition_is_consistent() {
        cli().debug_assert();
    }

    #[test]
    fn parses_upgrade_flags() {
        let matches = cli()
            .try_get_matches_from([
                "diamond-cut",
                "--network",
                "mainnet",
                "upgrade",
                "--diamond",
                "0x00000000000000000000000000000000000000d1",
                "--owner",
                "0x000000000000000000000000000000000000000a",
                "--plan",
                r#"[{"facetName":"Alpha","addSelectors":["f(uint256)"]}]"#,
                "--report-only",
                "--fresh",
            ])
            .unwrap();
        assert_eq!(matches.get_one::<String>("network").map(String::as_str), Some("mainnet"));
        let (name, args) = matches.subcommand().unwrap();
        assert_eq!(name, "upgrade");
        assert!(args.get_flag("report-only"));
        assert!(args.get_flag("fresh"));
        assert!(!args.get_flag("yes"));
        assert_eq!(args.get_one::<String>("signer").map(String::as_str), Some("unlocked"));
        assert_eq!(
            diamond_arg(args).unwrap(),
            "0x00000000000000000000000000000000000000d1".parse::<Address>().unwrap()
        );
    }

    #[test]
    fn rejects_unknown_signer() {
        let result = cli().try_get_matches_from([
            "diamond-cut",
            "upgrade",
            "--diamond",
            "0x00000000000000000000000000000000000000d1",
            "--owner",
            "0x000000000000000000000000000000000000000a",
            "--plan",
            "plan.json",
            "--signer",
            "ledger",
        ]);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn inline_plan_is_accepted() {
        let plan = read_plan(r#"[{"facetName":"Beta","removeSelectors":["0x12345678"]}]"#)
            .await
            .unwrap();
        assert_eq!(plan.entries.len(), 1);
        assert_eq!(plan.removals().len(), 1);
    }
}
