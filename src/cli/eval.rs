use super::ui;
use crate::core::expr::Expression;
use crate::core::form::to_fixed_2;
use crate::core::variable::Bindings;
use anyhow::{Result, anyhow};
use comfy_table::{Cell, CellAlignment};

/// Evaluates `expression` against `bindings` and prints the variables it read
/// along with the result.
pub fn run(expression: &str, bindings: &Bindings) -> Result<f64> {
    let parsed =
        Expression::parse(expression).map_err(|e| anyhow!("Expression is unevaluable: {}", e))?;

    let variables = parsed.variables();
    if !variables.is_empty() {
        let mut table = ui::new_styled_table();
        table.set_header(vec![
            ui::header_cell("Variable"),
            ui::header_cell("Value"),
            ui::header_cell("Meaning"),
        ]);
        for variable in variables {
            let value = if bindings.is_bound(variable) {
                Cell::new(bindings.get(variable).to_string()).set_alignment(CellAlignment::Right)
            } else {
                ui::na_cell(false)
            };
            table.add_row(vec![
                Cell::new(variable.as_str()),
                value,
                Cell::new(variable.description()),
            ]);
        }
        println!("{table}");
    }

    let value = parsed
        .eval(bindings)
        .map_err(|e| anyhow!("Expression is unevaluable: {}", e))?;
    println!(
        "{} {}",
        ui::style_text("Result:", ui::StyleType::Label),
        ui::style_text(&to_fixed_2(value), ui::StyleType::Value)
    );
    Ok(value)
}
