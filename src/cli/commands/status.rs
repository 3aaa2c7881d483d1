//! Status command - worker registration and cache inventory

use super::host::WorkerHost;
use crate::config::Config;
use crate::error::PostroomResult;
use crate::offline::WorkerState;
use crate::ui::{self, UiContext};
use console::{style, Emoji};

static CHECK: Emoji<'_, '_> = Emoji("✓ ", "[OK] ");
static WARN: Emoji<'_, '_> = Emoji("⚠ ", "[WARN] ");

/// Execute the status command
pub async fn execute(config: &Config) -> PostroomResult<()> {
    let ctx = UiContext::detect();
    let host = WorkerHost::open(config).await?;
    let settings = host.worker.controller().settings();

    println!("{}", style("Postroom Status").bold().cyan());
    println!();

    println!("{}", style("Worker:").bold());
    match &host.registration {
        Some(reg) if reg.worker_id == host.worker.id() => {
            let ok = reg.state == WorkerState::Activated;
            ui::key_value(&ctx, "id", &reg.worker_id.to_string());
            ui::key_value_status(&ctx, "state", &reg.state.to_string(), ok);
            if let Some(at) = reg.installed_at {
                ui::key_value(&ctx, "installed", &at.format("%Y-%m-%d %H:%M").to_string());
            }
            if let Some(at) = reg.activated_at {
                ui::key_value(&ctx, "activated", &at.format("%Y-%m-%d %H:%M").to_string());
            }
        }
        Some(reg) => {
            println!(
                "  {} Registered worker uses {}/{}; run: postroom cache install",
                WARN, reg.shell_partition, reg.data_partition
            );
        }
        None => {
            println!("  {} No worker registered; run: postroom cache install", WARN);
        }
    }

    println!();
    println!("{}", style("Partitions:").bold());
    let storage = host.storage();
    let partitions = storage.partitions().await?;
    for name in [&settings.partitions.shell, &settings.partitions.data] {
        let entries = storage.len(name).await?;
        let mark = if entries > 0 { CHECK } else { WARN };
        println!("  {} {} ({} entries)", mark, name, entries);
    }
    for name in partitions
        .iter()
        .filter(|name| !settings.partitions.is_current(name))
    {
        println!("  {} {} {}", WARN, name, style("stale").yellow());
    }

    println!();
    println!("{}", style("Bootstrap:").bold());
    ui::key_value(
        &ctx,
        "modules",
        &config.bootstrap.modules.len().to_string(),
    );
    ui::key_value(
        &ctx,
        "retry",
        &format!(
            "{} attempts, {}ms linear backoff",
            config.bootstrap.max_attempts, config.bootstrap.base_delay_ms
        ),
    );
    ui::key_value(&ctx, "storage", &host.dir.display().to_string());

    Ok(())
}
