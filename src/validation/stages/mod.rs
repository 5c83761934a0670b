//! Built-in validation stages, one file each.

mod binding;
mod expression;
mod schema;

pub use binding::BindingStage;
pub use expression::ExpressionStage;
pub use schema::SchemaStage;
