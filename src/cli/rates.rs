use super::ui;
use crate::core::rate::{ExchangeRate, ExchangeRateProvider, RateEntry, RateUpdate, rate_ledger};
use crate::core::submit::SubmitGuard;
use anyhow::Result;
use chrono::NaiveDateTime;
use comfy_table::{Cell, CellAlignment, Color};
use futures::future::{join, try_join};
use tracing::warn;

fn date_cell(value: Option<NaiveDateTime>) -> Cell {
    value.map_or_else(
        || ui::na_cell(false),
        |dt| Cell::new(dt.format("%Y-%m-%d %H:%M").to_string()),
    )
}

/// Four decimals when the stored string is numeric, otherwise as stored.
fn rate_text(raw: &str) -> String {
    raw.trim()
        .parse::<f64>()
        .map(|value| format!("{value:.4}"))
        .unwrap_or_else(|_| raw.to_string())
}

fn print_current(rate: &ExchangeRate) {
    let since = rate
        .valid_from
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "Not set".to_string());
    println!(
        "{} 1 {} = {} {} (since {})",
        ui::style_text("Current rate:", ui::StyleType::Label),
        rate.to_currency,
        ui::style_text(&rate_text(&rate.rate), ui::StyleType::Value),
        rate.from_currency,
        since
    );
}

/// Shows the current rate, then every stored rate with the audit record that
/// introduced it. The rate list and its history are fetched concurrently.
pub async fn list(provider: &dyn ExchangeRateProvider) -> Result<Vec<RateEntry>> {
    let (current, ledger) = join(
        provider.current_rate(),
        try_join(provider.all_rates(), provider.rate_history()),
    )
    .await;

    match current {
        Ok(rate) => print_current(&rate),
        Err(e) => {
            warn!(error = %e, "Current exchange rate unavailable");
            println!(
                "{}",
                ui::style_text("Current rate: Not set", ui::StyleType::Subtle)
            );
        }
    }

    let (rates, history) = ledger?;
    let entries = rate_ledger(&rates, &history);
    if entries.is_empty() {
        println!("No exchange rate data found.");
        return Ok(entries);
    }

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Pair"),
        ui::header_cell("Rate"),
        ui::header_cell("Valid from"),
        ui::header_cell("Valid to"),
        ui::header_cell("Status"),
        ui::header_cell("Changed by"),
        ui::header_cell("Changed at"),
        ui::header_cell("Reason"),
    ]);
    for entry in &entries {
        let status = if entry.is_current() {
            Cell::new("current").fg(Color::Green)
        } else {
            Cell::new("expired").fg(Color::DarkGrey)
        };
        table.add_row(vec![
            Cell::new(format!("{}/{}", entry.from_currency, entry.to_currency)),
            Cell::new(rate_text(&entry.rate)).set_alignment(CellAlignment::Right),
            date_cell(entry.valid_from),
            date_cell(entry.valid_to),
            status,
            Cell::new(&entry.changed_by),
            date_cell(entry.changed_at),
            entry
                .reason
                .as_deref()
                .map_or_else(|| ui::na_cell(false), Cell::new),
        ]);
    }
    println!("{table}");
    Ok(entries)
}

/// Publishes a new rate through `guard`; a second submit while one is pending
/// is refused.
pub async fn update(
    provider: &dyn ExchangeRateProvider,
    guard: &SubmitGuard,
    update: &RateUpdate,
) -> Result<ExchangeRate> {
    let rate = guard.submit(provider.update_rate(update)).await?;
    println!(
        "Exchange rate updated: {}/{} = {} from {}",
        rate.from_currency,
        rate.to_currency,
        ui::style_text(&rate_text(&rate.rate), ui::StyleType::Value),
        update.effective_date.format("%Y-%m-%d %H:%M")
    );
    Ok(rate)
}
