use super::{parse_assignments, ui};
use crate::core::builder::{Component, FormulaBuilder, Operator, describe_variables};
use crate::core::variable::Bindings;
use anyhow::{Context, Result};
use comfy_table::Cell;

/// Edits requested on the command line, as `index=value` pairs.
#[derive(Debug, Clone, Default)]
pub struct Edits {
    pub operators: Vec<String>,
    pub numbers: Vec<String>,
}

fn parse_index(raw: &str) -> Result<usize> {
    raw.parse::<usize>()
        .with_context(|| format!("Invalid component position: {}", raw))
}

/// Applies `edits` to the component view of `expression`.
pub fn apply_edits(expression: &str, edits: &Edits) -> Result<FormulaBuilder> {
    let mut builder = FormulaBuilder::parse(expression);
    for (index, symbol) in parse_assignments(&edits.operators)? {
        let op: Operator = symbol.parse()?;
        builder.set_operator(parse_index(&index)?, op)?;
    }
    for (index, literal) in parse_assignments(&edits.numbers)? {
        builder.set_number(parse_index(&index)?, &literal)?;
    }
    Ok(builder)
}

pub fn run(expression: &str, edits: &Edits, bindings: Option<&Bindings>) -> Result<()> {
    let builder = apply_edits(expression, edits)?;

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("#"),
        ui::header_cell("Kind"),
        ui::header_cell("Component"),
    ]);
    for (i, component) in builder.components().iter().enumerate() {
        let kind = match component {
            Component::Variable(_) => "variable",
            Component::Operator(_) => "operator",
            Component::Number(_) => "number",
        };
        table.add_row(vec![
            Cell::new(i),
            Cell::new(kind),
            Cell::new(component.to_string()),
        ]);
    }
    println!("{table}");

    let edited = builder.expression();
    for (variable, meaning) in describe_variables(&edited) {
        println!(
            "{} {}",
            ui::style_text(variable.as_str(), ui::StyleType::Label),
            ui::style_text(meaning, ui::StyleType::Subtle)
        );
    }

    println!(
        "\n{} {}",
        ui::style_text("Formula:", ui::StyleType::Label),
        edited
    );
    if let Some(bindings) = bindings {
        let preview = match builder.preview(bindings) {
            Some(value) => ui::style_text(&crate::core::form::to_fixed_2(value), ui::StyleType::Value),
            None => ui::style_text("unevaluable", ui::StyleType::Error),
        };
        println!("{} {}", ui::style_text("Preview:", ui::StyleType::Label), preview);
    }
    Ok(())
}
