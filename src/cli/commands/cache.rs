//! Cache command - install, activate and inspect the offline cache

use super::host::WorkerHost;
use crate::cli::args::{CacheAction, CacheArgs};
use crate::config::Config;
use crate::error::{PostroomError, PostroomResult};
use crate::offline::disk::validate_partition_name;
use crate::offline::{Registration, WorkerState};
use crate::ui::{self, TaskSpinner, UiContext};
use console::style;

/// Execute the cache command
pub async fn execute(args: CacheArgs, config: &Config) -> PostroomResult<()> {
    let mut host = WorkerHost::open(config).await?;

    match args.action {
        CacheAction::Install => install(&mut host).await,
        CacheAction::Activate => activate(&mut host).await,
        CacheAction::List => list(&host).await,
        CacheAction::Clear { partition } => clear(&host, partition).await,
    }
}

async fn install(host: &mut WorkerHost) -> PostroomResult<()> {
    let ctx = UiContext::detect();
    let settings = host.worker.controller().settings().clone();

    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start(&format!(
        "Precaching {} shell asset(s)...",
        settings.shell_assets.len()
    ));
    let state = host.worker.install().await;
    host.persist().await?;

    let cached = host.storage().len(&settings.partitions.shell).await?;
    if cached < settings.shell_assets.len() {
        spinner.stop_warn("Shell precache incomplete; pages will not load offline");
    } else {
        spinner.stop(&format!(
            "Cached {} asset(s) in {}",
            cached, settings.partitions.shell
        ));
    }

    match state {
        WorkerState::Activated => ui::step_ok(&ctx, "Worker activated"),
        WorkerState::Installed => ui::step_warn_hint(
            &ctx,
            "Worker installed and waiting",
            "Run: postroom cache activate",
        ),
        other => ui::step_info(&ctx, &format!("Worker is {}", other)),
    }

    Ok(())
}

async fn activate(host: &mut WorkerHost) -> PostroomResult<()> {
    let ctx = UiContext::detect();

    if host.worker.state() == WorkerState::Parsed {
        return Err(PostroomError::User(
            "No installed worker to activate. Run: postroom cache install".to_string(),
        ));
    }

    let before = host.storage().partitions().await?;
    let state = host.worker.activate().await;
    host.persist().await?;

    let after = host.storage().partitions().await?;
    for name in before.iter().filter(|name| !after.contains(name)) {
        ui::step_info(&ctx, &format!("Removed stale partition {}", name));
    }
    ui::step_ok(&ctx, &format!("Worker {}", state));

    Ok(())
}

async fn list(host: &WorkerHost) -> PostroomResult<()> {
    let storage = host.storage();
    let partitions = storage.partitions().await?;

    if partitions.is_empty() {
        println!("No cache partitions found.");
        return Ok(());
    }

    let current = &host.worker.controller().settings().partitions;

    println!("{:<32} {:<10} {:<8}", "PARTITION", "ENTRIES", "STATE");
    println!("{}", "-".repeat(52));

    for name in &partitions {
        let entries = storage.len(name).await?;
        let state = if current.is_current(name) {
            style("current").green().to_string()
        } else {
            style("stale").yellow().to_string()
        };
        println!("{:<32} {:<10} {:<8}", name, entries, state);
    }

    println!();
    println!("Total: {} partition(s)", partitions.len());

    Ok(())
}

async fn clear(host: &WorkerHost, partition: Option<String>) -> PostroomResult<()> {
    let ctx = UiContext::detect();
    let storage = host.storage();

    if let Some(name) = partition {
        validate_partition_name(&name)?;
        if storage.delete_partition(&name).await? {
            ui::step_ok(&ctx, &format!("Deleted partition {}", name));
        } else {
            ui::step_warn(&ctx, &format!("Partition {} not found", name));
        }
        return Ok(());
    }

    let mut removed = 0;
    for name in storage.partitions().await? {
        if storage.delete_partition(&name).await? {
            removed += 1;
        }
    }
    let unregistered = Registration::delete(&host.dir).await?;

    ui::step_ok(&ctx, &format!("Deleted {} partition(s)", removed));
    if unregistered {
        ui::step_ok(&ctx, "Removed worker registration");
    }

    Ok(())
}
