use super::ui;
use crate::core::form::FormType;
use crate::core::formula::{FormulaProvider, FormulaUpdate, VersionBump};
use crate::core::submit::SubmitGuard;
use anyhow::Result;
use chrono::NaiveDateTime;
use comfy_table::Cell;

fn date_cell(value: Option<NaiveDateTime>) -> Cell {
    value.map_or_else(
        || ui::na_cell(false),
        |dt| Cell::new(dt.format("%Y-%m-%d %H:%M").to_string()),
    )
}

/// Lists the active formulas, or only those used by `form`.
pub async fn list(provider: &dyn FormulaProvider, form: Option<FormType>) -> Result<()> {
    let mut table = ui::new_styled_table();

    if let Some(form) = form {
        let formulas = provider.fetch_for_form(form).await?;
        if formulas.is_empty() {
            println!("No formulas configured for the {} form.", form);
            return Ok(());
        }
        table.set_header(vec![
            ui::header_cell("Field"),
            ui::header_cell("Expression"),
            ui::header_cell("Version"),
            ui::header_cell("Effective from"),
        ]);
        for (field, formula) in formulas.iter() {
            table.add_row(vec![
                Cell::new(field),
                Cell::new(&formula.expression),
                Cell::new(formula.version),
                date_cell(formula.effective_from),
            ]);
        }
    } else {
        let records = provider.fetch_active().await?;
        if records.is_empty() {
            println!("No active formulas found.");
            return Ok(());
        }
        table.set_header(vec![
            ui::header_cell("Key"),
            ui::header_cell("Form"),
            ui::header_cell("Field"),
            ui::header_cell("Expression"),
            ui::header_cell("Version"),
            ui::header_cell("Effective from"),
        ]);
        for record in &records {
            table.add_row(vec![
                Cell::new(&record.formula_key),
                Cell::new(record.form_label()),
                Cell::new(record.field_label.as_deref().unwrap_or("")),
                Cell::new(&record.expression),
                Cell::new(record.version),
                date_cell(record.effective_from),
            ]);
        }
    }

    println!("{table}");
    Ok(())
}

/// Shows every version of one formula, or the change log across all of them.
pub async fn history(provider: &dyn FormulaProvider, formula_key: Option<&str>) -> Result<()> {
    let mut table = ui::new_styled_table();

    match formula_key {
        Some(key) => {
            let versions = provider.fetch_history(key).await?;
            println!(
                "History for {}",
                ui::style_text(key, ui::StyleType::Title)
            );
            table.set_header(vec![
                ui::header_cell("Version"),
                ui::header_cell("Expression"),
                ui::header_cell("From"),
                ui::header_cell("To"),
                ui::header_cell("Changed by"),
            ]);
            for version in &versions {
                table.add_row(vec![
                    Cell::new(version.version),
                    Cell::new(&version.expression),
                    date_cell(version.effective_from),
                    date_cell(version.effective_to),
                    Cell::new(version.changed_by.as_deref().unwrap_or("")),
                ]);
            }
        }
        None => {
            let changes = provider.fetch_change_log().await?;
            table.set_header(vec![
                ui::header_cell("Key"),
                ui::header_cell("Change"),
                ui::header_cell("Versions"),
                ui::header_cell("By"),
                ui::header_cell("At"),
                ui::header_cell("Reason"),
            ]);
            for change in &changes {
                table.add_row(vec![
                    Cell::new(&change.formula_key),
                    Cell::new(format!(
                        "{}\n{}",
                        change.old_expression, change.new_expression
                    )),
                    Cell::new(format!("v{} -> v{}", change.old_version, change.new_version)),
                    Cell::new(&change.changed_by),
                    date_cell(change.changed_at),
                    Cell::new(change.change_reason.as_deref().unwrap_or("")),
                ]);
            }
        }
    }

    println!("{table}");
    Ok(())
}

/// Submits a revision through `guard`, so a second submit while one is
/// pending is refused.
pub async fn update(
    provider: &dyn FormulaProvider,
    guard: &SubmitGuard,
    formula_key: &str,
    update: &FormulaUpdate,
) -> Result<VersionBump> {
    let bump = guard.submit(provider.update(formula_key, update)).await?;
    println!(
        "{} updated: v{} -> v{}",
        ui::style_text(formula_key, ui::StyleType::Label),
        bump.old_version,
        ui::style_text(&bump.new_version.to_string(), ui::StyleType::Value)
    );
    Ok(bump)
}
