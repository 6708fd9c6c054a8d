use anyhow::Result;
use clap::{Args, CommandFactory, Parser, Subcommand};
use formulary::cli::describe::Edits;
use formulary::core::FormType;
use formulary::core::log::init_logging;
use formulary::{AppCommand, DraftAction, RateAction};

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Evaluate a formula expression offline
    Eval {
        #[arg(allow_hyphen_values = true)]
        expression: String,
        /// Variable values as name=value
        #[arg(short = 's', long = "set", value_name = "NAME=VALUE")]
        bindings: Vec<String>,
    },
    /// Break a formula into components, optionally editing operators or numbers
    Describe {
        #[arg(allow_hyphen_values = true)]
        expression: String,
        /// Replace the operator at a position, e.g. 1=*
        #[arg(long = "operator", value_name = "INDEX=OP")]
        operators: Vec<String>,
        /// Replace the number at a position, e.g. 2=0.25
        #[arg(long = "number", value_name = "INDEX=VALUE")]
        numbers: Vec<String>,
        /// Preview the edited formula with these values
        #[arg(short = 's', long = "set", value_name = "NAME=VALUE")]
        bindings: Vec<String>,
    },
    /// List active formulas
    Formulas {
        /// Only formulas used by this form (profit or matching)
        #[arg(short, long)]
        form: Option<FormType>,
    },
    /// Show version history of a formula, or the change log of all formulas
    History { formula_key: Option<String> },
    /// Publish a new version of a formula
    Update(UpdateArgs),
    /// Recalculate the computed fields of a form
    Compute {
        form: FormType,
        /// Form inputs as name=value
        #[arg(value_name = "NAME=VALUE")]
        inputs: Vec<String>,
    },
    /// View or publish HNL/USD exchange rates
    #[command(subcommand)]
    Rates(RateCommands),
    /// Manage saved form drafts
    #[command(subcommand)]
    Draft(DraftCommands),
}

#[derive(Subcommand)]
enum RateCommands {
    /// Show the current rate and every stored rate with its audit record
    List,
    /// Publish a new rate, in Lempiras per US dollar
    Update {
        #[arg(allow_hyphen_values = true)]
        rate: f64,
        /// Date the rate takes effect, e.g. 2024-07-01 or 2024-07-01T09:30:00
        #[arg(short, long)]
        effective_date: String,
        /// Reason recorded in the audit log
        #[arg(short, long)]
        reason: String,
    },
}

#[derive(Args)]
struct UpdateArgs {
    formula_key: String,
    #[arg(allow_hyphen_values = true)]
    expression: String,
    /// Reason recorded in the change log
    #[arg(short, long)]
    reason: String,
    #[arg(short, long, default_value = "")]
    description: String,
}

#[derive(Subcommand)]
enum DraftCommands {
    /// List drafts saved by the current user
    List,
    /// Show the saved draft of a form
    Show { form: FormType },
    /// Save form fields as name=value
    Save {
        form: FormType,
        #[arg(value_name = "NAME=VALUE", required = true)]
        fields: Vec<String>,
    },
    /// Discard the saved draft of a form
    Clear { form: FormType },
}

impl From<Commands> for AppCommand {
    fn from(cmd: Commands) -> AppCommand {
        match cmd {
            Commands::Setup => AppCommand::Setup,
            Commands::Eval {
                expression,
                bindings,
            } => AppCommand::Eval {
                expression,
                bindings,
            },
            Commands::Describe {
                expression,
                operators,
                numbers,
                bindings,
            } => AppCommand::Describe {
                expression,
                edits: Edits { operators, numbers },
                bindings: (!bindings.is_empty()).then_some(bindings),
            },
            Commands::Formulas { form } => AppCommand::Formulas { form },
            Commands::History { formula_key } => AppCommand::History { formula_key },
            Commands::Update(args) => AppCommand::Update {
                formula_key: args.formula_key,
                expression: args.expression,
                description: args.description,
                reason: args.reason,
            },
            Commands::Compute { form, inputs } => AppCommand::Compute { form, inputs },
            Commands::Rates(rates) => AppCommand::Rates(match rates {
                RateCommands::List => RateAction::List,
                RateCommands::Update {
                    rate,
                    effective_date,
                    reason,
                } => RateAction::Update {
                    rate,
                    effective_date,
                    reason,
                },
            }),
            Commands::Draft(draft) => AppCommand::Draft(match draft {
                DraftCommands::List => DraftAction::List,
                DraftCommands::Show { form } => DraftAction::Show(form),
                DraftCommands::Save { form, fields } => DraftAction::Save(form, fields),
                DraftCommands::Clear { form } => DraftAction::Clear(form),
            }),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(cmd) => formulary::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
