//! Plan command - show module initialization order

use crate::bootstrap::{LoadPlan, Registry};
use crate::config::{Config, ModuleEntry};
use crate::error::PostroomResult;
use crate::ui::{self, UiContext};

/// Execute the plan command
pub async fn execute(config: &Config) -> PostroomResult<()> {
    let ctx = UiContext::detect();
    let modules = &config.bootstrap.modules;

    if modules.is_empty() {
        ui::step_warn_hint(
            &ctx,
            "No modules configured",
            "Add [[bootstrap.modules]] entries to the config file",
        );
        return Ok(());
    }

    let plan = plan_modules(modules)?;

    ui::section(&ctx, "Initialization order");
    for (position, name) in plan.order.iter().enumerate() {
        ui::step_ok(&ctx, &format!("{}. {}", position + 1, name));
    }

    if !plan.blocked.is_empty() {
        ui::section(&ctx, "Blocked");
        for (name, dependency) in &plan.blocked {
            ui::step_blocked(&ctx, name, dependency);
        }
    }

    Ok(())
}

/// Register every configured module with a no-op initializer and order them
fn plan_modules(modules: &[ModuleEntry]) -> PostroomResult<LoadPlan> {
    let mut registry = Registry::new();
    for module in modules {
        let dependencies: Vec<&str> = module.depends_on.iter().map(String::as_str).collect();
        registry.register(&module.name, || Ok(()), &dependencies);
    }
    registry.load_order()
}
