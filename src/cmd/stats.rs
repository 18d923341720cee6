//! Order summary: `production-orders stats`.

use anyhow::{Context, Result};
use console::style;

use production_orders::config::AppConfig;
use production_orders::tracker::models::{
    OrderType, ProblemStatus, RequisitionStatus, StatusCounts,
};
use production_orders::tracker::store::{JsonStore, load_default_prices};

pub fn cmd_stats(config: &AppConfig) -> Result<()> {
    let data_file = config.data_file();
    let store = JsonStore::new(data_file.clone(), load_default_prices(&config.default_prices_file()));
    let doc = store
        .snapshot()
        .with_context(|| format!("Failed to load {}", data_file.display()))?;
    let stats = doc.order_stats();

    println!();
    println!("{}", style("Production Orders").bold());
    println!("{}", style(data_file.display()).dim());
    println!();
    println!(
        "  {:<10} {:>6} {:>8} {:>11} {:>6}",
        "type", "total", "pending", "in progress", "done"
    );
    for (ty, counts) in [
        (OrderType::Injection, &stats.injection),
        (OrderType::Slush, &stats.slush),
        (OrderType::Spray, &stats.spray),
    ] {
        print_row(ty, counts);
    }

    let open_problems = doc
        .problems
        .iter()
        .filter(|p| p.status != ProblemStatus::Resolved.as_str())
        .count();
    let pending_requisitions = doc
        .material_requisitions
        .iter()
        .filter(|r| r.status != RequisitionStatus::Issued.as_str())
        .count();
    println!();
    println!("  open problems:         {}", style(open_problems).yellow());
    println!("  pending requisitions:  {}", style(pending_requisitions).yellow());
    println!();
    Ok(())
}

fn print_row(ty: OrderType, counts: &StatusCounts) {
    println!(
        "  {:<10} {:>6} {:>8} {:>11} {:>6}",
        style(ty).cyan(),
        counts.total,
        counts.pending,
        counts.in_progress,
        style(counts.done).green()
    );
}
