//! `labtrail` command-line host for the sync core.
//!
//! # Responsibility
//! - Probe core linkage (`ping`).
//! - Report local record and mapping counts of a database (`status`).
//! - Run a scripted write-through, push and pull round (`demo`).

use clap::{Args, Parser, Subcommand};
use labtrail_core::sync::RemoteCodec;
use labtrail_core::{
    init_from_config, open_db, CoreConfig, EntityKind, InMemoryRemoteStore, LocalStore,
    MappingStore, Project, Session, SharedDb, SyncEngine, SyncReport,
};
use log::info;
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "labtrail")]
#[command(about = "Offline-first research tracker: sync core tools")]
#[command(version)]
struct Cli {
    /// JSON config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Absolute directory for rolling log files.
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Check that the core library is linked")]
    Ping,
    #[command(about = "Show per-type record and mapping counts")]
    Status(StatusArgs),
    #[command(about = "Run write-through, push and pull against an in-memory remote")]
    Demo(DemoArgs),
}

#[derive(Args)]
struct StatusArgs {
    /// Database file; falls back to `db_path` from the config.
    #[arg(long)]
    db: Option<PathBuf>,

    /// Also count identifier mappings of this user.
    #[arg(long)]
    user: Option<String>,
}

#[derive(Args)]
struct DemoArgs {
    #[arg(long, default_value = "demo-user")]
    user: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let mut config = match cli.config.as_deref() {
        Some(path) => CoreConfig::from_file(path)?,
        None => CoreConfig::default(),
    };
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }
    if let Some(dir) = cli.log_dir {
        config.log_dir = Some(dir);
    }
    init_from_config(&config, true)?;

    match cli.command {
        Commands::Ping => {
            println!("labtrail_core ping={}", labtrail_core::ping());
            println!("labtrail_core version={}", labtrail_core::core_version());
            Ok(())
        }
        Commands::Status(args) => status(&config, args),
        Commands::Demo(args) => demo(&config, args).await,
    }
}

fn status(config: &CoreConfig, args: StatusArgs) -> Result<(), Box<dyn Error>> {
    let path = args
        .db
        .or_else(|| config.db_path.clone())
        .ok_or("no database given; pass --db or set db_path in the config")?;
    let db = SharedDb::new(open_db(&path)?);
    let local = LocalStore::new(db.clone());
    let mapping_counts = match args.user.as_deref() {
        Some(user) => Some(MappingStore::new(db).count_for_user(user)?),
        None => None,
    };

    println!("database={}", path.display());
    for kind in EntityKind::ALL {
        let records = local.count(kind)?;
        match mapping_counts.as_ref() {
            Some(counts) => println!(
                "{kind:<18} local={records:<6} mapped={}",
                counts.get(&kind).copied().unwrap_or(0)
            ),
            None => println!("{kind:<18} local={records}"),
        }
    }
    Ok(())
}

async fn demo(config: &CoreConfig, args: DemoArgs) -> Result<(), Box<dyn Error>> {
    let remote = Arc::new(InMemoryRemoteStore::with_sequential_ids());
    let engine = SyncEngine::new(
        SharedDb::in_memory()?,
        remote.clone(),
        Session::signed_in(args.user.as_str()),
        config.sync.clone(),
    );
    info!("event=demo_start module=cli status=ok");

    let sleep = engine.projects().insert(Project::new("Sleep study", "")).await?;
    engine.flush().await;
    println!(
        "insert project={sleep} mapped={:?}",
        engine
            .mappings()
            .remote_id_for(EntityKind::Project, sleep, &args.user)?
    );

    remote.fail_next_writes(1);
    let diet = engine.projects().insert(Project::new("Diet study", "")).await?;
    engine.flush().await;
    println!(
        "insert project={diet} (remote write failed) mapped={:?}",
        engine
            .mappings()
            .remote_id_for(EntityKind::Project, diet, &args.user)?
    );

    let pushed = engine.sync_to_cloud().await?;
    print_report("push", &pushed);
    println!(
        "after push project={diet} mapped={:?}",
        engine
            .mappings()
            .remote_id_for(EntityKind::Project, diet, &args.user)?
    );

    let mut other_device = Project::new("Running log", "Recorded on another device");
    other_device.meta.created_at = 1;
    other_device.meta.updated_at = 1;
    remote.put_document(
        EntityKind::Project.collection(),
        "phone-1",
        other_device.to_document(&args.user, None),
    );
    let pulled = engine.sync_from_cloud().await?;
    print_report("pull", &pulled);
    println!(
        "local projects={} remote projects={}",
        engine.local().count(EntityKind::Project)?,
        remote.document_count(EntityKind::Project.collection())
    );
    Ok(())
}

fn print_report(label: &str, report: &SyncReport) {
    println!(
        "{label}: imported={} updated_locally={} created={} updated_remotely={} skipped={}",
        report.imported(),
        report.updated_locally(),
        report.created(),
        report.updated_remotely(),
        report.skipped()
    );
}
