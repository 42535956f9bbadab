//! Expression objects that gene set databases are conformed against.

mod count_matrix;
mod expression;
mod target;

pub use count_matrix::CountMatrix;
pub use expression::ExpressionMatrix;
pub use target::{validate_target, RowIdentifiers};
