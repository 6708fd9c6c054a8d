pub mod cli;
pub mod core;
pub mod providers;
pub mod store;

use crate::cli::describe::Edits;
use crate::core::cache::Cache;
use crate::core::config::AppConfig;
use crate::core::draft::FormAutosave;
use crate::core::formula::FormulaUpdate;
use crate::core::rate::RateUpdate;
use crate::core::submit::SubmitGuard;
use crate::core::{FormType, SessionContext, SessionProvider};
use crate::providers::PortalClient;
use crate::store::KeyValueStore;
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info};

/// Collection holding every form draft.
const DRAFTS: &str = "drafts";

#[derive(Debug, Clone)]
pub enum DraftAction {
    List,
    Show(FormType),
    Save(FormType, Vec<String>),
    Clear(FormType),
}

#[derive(Debug, Clone)]
pub enum RateAction {
    List,
    Update {
        rate: f64,
        effective_date: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub enum AppCommand {
    Setup,
    Eval {
        expression: String,
        bindings: Vec<String>,
    },
    Describe {
        expression: String,
        edits: Edits,
        bindings: Option<Vec<String>>,
    },
    Formulas {
        form: Option<FormType>,
    },
    History {
        formula_key: Option<String>,
    },
    Update {
        formula_key: String,
        expression: String,
        description: String,
        reason: String,
    },
    Compute {
        form: FormType,
        inputs: Vec<String>,
    },
    Rates(RateAction),
    Draft(DraftAction),
}

/// Loads the configuration from `config_path`, else from the default
/// location. A missing default file falls back to built-in defaults.
pub fn load_config(config_path: Option<&str>) -> Result<AppConfig> {
    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => {
            let default_path = AppConfig::default_config_path()?;
            if default_path.exists() {
                AppConfig::load_from_path(&default_path)?
            } else {
                debug!("No config at {}, using defaults", default_path.display());
                AppConfig::default()
            }
        }
    };
    debug!("Loaded config: {config:#?}");
    Ok(config)
}

fn portal_client(config: &AppConfig) -> Result<PortalClient> {
    PortalClient::new(&config.portal, Arc::new(Cache::new()))
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("formulary starting...");

    match command {
        AppCommand::Setup => match config_path {
            Some(path) => cli::setup::setup_at_path(path),
            None => cli::setup::setup(),
        },
        AppCommand::Eval {
            expression,
            bindings,
        } => {
            let bindings = cli::parse_bindings(&bindings)?;
            cli::eval::run(&expression, &bindings).map(|_| ())
        }
        AppCommand::Describe {
            expression,
            edits,
            bindings,
        } => {
            let bindings = bindings
                .map(|args| cli::parse_bindings(&args))
                .transpose()?;
            cli::describe::run(&expression, &edits, bindings.as_ref())
        }
        AppCommand::Formulas { form } => {
            let client = portal_client(&load_config(config_path)?)?;
            cli::formulas::list(&client, form).await
        }
        AppCommand::History { formula_key } => {
            let client = portal_client(&load_config(config_path)?)?;
            cli::formulas::history(&client, formula_key.as_deref()).await
        }
        AppCommand::Update {
            formula_key,
            expression,
            description,
            reason,
        } => {
            let update = FormulaUpdate::new(&expression, &description, &reason)?;
            let client = portal_client(&load_config(config_path)?)?;
            let guard = SubmitGuard::new();
            cli::formulas::update(&client, &guard, &formula_key, &update)
                .await
                .map(|_| ())
        }
        AppCommand::Compute { form, inputs } => {
            let inputs = cli::parse_bindings(&inputs)?;
            let client = portal_client(&load_config(config_path)?)?;
            cli::compute::run(form, inputs, &client, &client)
                .await
                .map(|_| ())
        }
        AppCommand::Rates(RateAction::List) => {
            let client = portal_client(&load_config(config_path)?)?;
            cli::rates::list(&client).await.map(|_| ())
        }
        AppCommand::Rates(RateAction::Update {
            rate,
            effective_date,
            reason,
        }) => {
            let update = RateUpdate::new(rate, &effective_date, &reason)?;
            let client = portal_client(&load_config(config_path)?)?;
            let guard = SubmitGuard::new();
            cli::rates::update(&client, &guard, &update)
                .await
                .map(|_| ())
        }
        AppCommand::Draft(action) => {
            let config = load_config(config_path)?;
            let client = portal_client(&config)?;
            let context = SessionContext::new(client.user_key().await, config.language);
            debug!(%context, "Resolved session");

            let store = KeyValueStore::open(&config.data_path()?)?;
            let collection = store.get_collection(DRAFTS)?;
            let autosave_for = |form: FormType| {
                FormAutosave::new(
                    form.form_id(),
                    &context,
                    Arc::clone(&collection),
                    config.autosave.options(),
                )
            };

            match action {
                DraftAction::List => {
                    cli::draft::list(collection.as_ref(), &context).await?;
                }
                DraftAction::Show(form) => cli::draft::show(&autosave_for(form), &context).await?,
                DraftAction::Save(form, fields) => {
                    let data = cli::draft::parse_fields(&fields)?;
                    cli::draft::save(&autosave_for(form), &data).await?;
                }
                DraftAction::Clear(form) => cli::draft::clear(&autosave_for(form)).await?,
            }
            store.persist()
        }
    }
}
