//! Pagination and consolidation planning (spec §4.4–§4.5).

pub mod consolidation;
pub mod pagination;

pub use consolidation::{plan_consolidation, ConsolidationPlan, FieldBuckets};
pub use pagination::{plan_pagination, PaginationPlan};
