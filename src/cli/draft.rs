use super::{parse_assignments, ui};
use crate::core::draft::{
    DraftCollection, FieldValue, FormAutosave, FormData, drafts_for_user, time_ago,
};
use crate::core::SessionContext;
use anyhow::Result;
use chrono::Utc;
use comfy_table::Cell;

/// `true`/`false` become checkbox states; anything else is kept as text.
pub fn parse_fields(args: &[String]) -> Result<FormData> {
    Ok(parse_assignments(args)?
        .into_iter()
        .map(|(name, value)| {
            let value = match value.as_str() {
                "true" => FieldValue::Checked(true),
                "false" => FieldValue::Checked(false),
                _ => FieldValue::Text(value),
            };
            (name, value)
        })
        .collect())
}

pub async fn list(collection: &dyn DraftCollection, context: &SessionContext) -> Result<Vec<String>> {
    let keys = drafts_for_user(collection, context).await;
    if keys.is_empty() {
        println!(
            "{}",
            context.language.pick("No saved drafts.", "No hay borradores guardados.")
        );
    }
    for key in &keys {
        println!("{key}");
    }
    Ok(keys)
}

pub async fn show(autosave: &FormAutosave, context: &SessionContext) -> Result<()> {
    let Some(draft) = autosave.restore().await else {
        println!(
            "{}",
            context.language.pick("No saved draft.", "No hay borrador guardado.")
        );
        return Ok(());
    };

    println!(
        "{} {}",
        ui::style_text(
            context.language.pick("Draft saved", "Borrador guardado"),
            ui::StyleType::Label
        ),
        ui::style_text(
            &time_ago(draft.timestamp, Utc::now(), context.language),
            ui::StyleType::Subtle
        )
    );

    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Field"), ui::header_cell("Value")]);
    for (name, value) in &draft.data {
        let value = match value {
            FieldValue::Checked(checked) => Cell::new(if *checked { "[x]" } else { "[ ]" }),
            FieldValue::Text(text) => Cell::new(text),
        };
        table.add_row(vec![Cell::new(name), value]);
    }
    println!("{table}");
    Ok(())
}

pub async fn save(autosave: &FormAutosave, data: &FormData) -> Result<bool> {
    let saved = autosave.save(data).await?;
    if saved {
        println!("Draft saved under {}", autosave.key());
    } else {
        println!("Nothing to save.");
    }
    Ok(saved)
}

pub async fn clear(autosave: &FormAutosave) -> Result<()> {
    autosave.clear().await;
    println!("Draft cleared for {}", autosave.key());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Language;
    use crate::core::draft::AutosaveOptions;
    use crate::store::memory::MemoryCollection;
    use std::sync::Arc;

    #[test]
    fn test_parse_fields() {
        let args = vec![
            "company_name=Acme".to_string(),
            "confirmed=true".to_string(),
            "profit_l=".to_string(),
        ];
        let data = parse_fields(&args).unwrap();
        assert_eq!(data["company_name"], FieldValue::Text("Acme".to_string()));
        assert_eq!(data["confirmed"], FieldValue::Checked(true));
        assert_eq!(data["profit_l"], FieldValue::Text(String::new()));
    }

    #[tokio::test]
    async fn test_save_show_clear() {
        let context = SessionContext::new("ana@example.org", Language::Es);
        let autosave = FormAutosave::new(
            "profit-form",
            &context,
            Arc::new(MemoryCollection::new()),
            AutosaveOptions::default(),
        );

        assert!(!save(&autosave, &FormData::new()).await.unwrap());
        let data = parse_fields(&["profit_l=50000".to_string()]).unwrap();
        assert!(save(&autosave, &data).await.unwrap());
        assert!(show(&autosave, &context).await.is_ok());

        clear(&autosave).await.unwrap();
        assert!(autosave.restore().await.is_none());
    }

    #[tokio::test]
    async fn test_list_only_shows_own_drafts() {
        let collection = Arc::new(MemoryCollection::new());
        collection
            .put("autosave_profit-form:ana@example.org", "{}".to_string())
            .await
            .unwrap();
        collection
            .put("autosave_profit-form:anonymous", "{}".to_string())
            .await
            .unwrap();

        let context = SessionContext::anonymous(Language::En);
        let keys = list(collection.as_ref(), &context).await.unwrap();
        assert_eq!(keys, vec!["autosave_profit-form:anonymous".to_string()]);
    }
}
