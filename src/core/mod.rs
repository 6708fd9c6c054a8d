//! Core formula logic and abstractions

pub mod builder;
pub mod cache;
pub mod config;
pub mod context;
pub mod draft;
pub mod expr;
pub mod form;
pub mod formula;
pub mod log;
pub mod rate;
pub mod submit;
pub mod variable;

// Re-export main types for cleaner imports
pub use context::{Language, SessionContext, SessionProvider};
pub use expr::{Expression, UnevaluableExpression, evaluate, try_evaluate};
pub use form::{FormType, recalculate};
pub use formula::{Formula, FormulaProvider, FormulaSet};
pub use rate::{ExchangeRate, ExchangeRateProvider, RateUpdate};
pub use variable::{Bindings, Variable};
