use super::ui;
use crate::core::expr;
use crate::core::form::{FormType, Recalculation, recalculate};
use crate::core::formula::FormulaProvider;
use crate::core::rate::ExchangeRateProvider;
use crate::core::variable::{Bindings, Variable};
use anyhow::Result;
use comfy_table::{Cell, CellAlignment};
use futures::future::join;
use tracing::{debug, warn};

/// Fetches the form's formulas and the current exchange rate concurrently,
/// then recalculates the computed fields from `inputs`.
///
/// An explicit `exchange_rate` input wins over the portal rate. A failed rate
/// lookup leaves the rate at zero, which blanks fields that divide by it.
pub async fn run(
    form: FormType,
    mut inputs: Bindings,
    formula_provider: &dyn FormulaProvider,
    rate_provider: &dyn ExchangeRateProvider,
) -> Result<Recalculation> {
    let pb = ui::new_progress_bar(2, true);
    pb.set_message(format!("Loading {} formulas", form));
    let (formulas, rate) = join(
        async {
            let res = formula_provider.fetch_for_form(form).await;
            pb.inc(1);
            res
        },
        async {
            let res = rate_provider.current_rate().await;
            pb.inc(1);
            res
        },
    )
    .await;
    pb.finish_and_clear();

    let formulas = formulas?;
    if !inputs.is_bound(Variable::ExchangeRate) {
        match rate.and_then(|r| r.value()) {
            Ok(value) => {
                debug!(rate = value, "Using current exchange rate");
                inputs.set(Variable::ExchangeRate, value);
            }
            Err(e) => warn!(error = %e, "Exchange rate unavailable"),
        }
    }

    let result = recalculate(form, &formulas, inputs);
    display(form, &result);
    Ok(result)
}

fn display(form: FormType, result: &Recalculation) {
    println!(
        "\nForm: {}",
        ui::style_text(form.as_str(), ui::StyleType::Title)
    );

    let mut inputs = ui::new_styled_table();
    inputs.set_header(vec![ui::header_cell("Input"), ui::header_cell("Value")]);
    for variable in form.inputs() {
        inputs.add_row(vec![
            Cell::new(variable.as_str()),
            Cell::new(result.bindings.get(*variable)).set_alignment(CellAlignment::Right),
        ]);
    }
    println!("{inputs}");

    if result.values.is_empty() {
        println!("No formulas configured for this form.");
        return;
    }

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Field"),
        ui::header_cell("Formula"),
        ui::header_cell("Value"),
    ]);
    for computed in &result.values {
        let value = match computed.value {
            Some(_) => ui::amount_cell(computed.value),
            None => ui::na_cell(expr::validate(&computed.expression).is_err()),
        };
        table.add_row(vec![
            Cell::new(computed.field.key()),
            Cell::new(&computed.expression),
            value,
        ]);
    }
    println!("{table}");
}
