//! SQL static analysis primitives: lexing/protection, field classification
//! and filter detection (spec §4.1–§4.3).

pub mod classifier;
pub mod filters;
pub mod lexer;

pub use classifier::{classify, AnalysedField, FieldKind};
pub use filters::detect_filters;
pub use lexer::{clean, group_by_fields, protect, restore, select_clause, split_fields_smart, where_clause};
