//! Shared string and report helpers.

pub mod forest;
pub mod natural;
pub mod text;

pub use forest::{indent_forest, Forest};
pub use natural::{natural_cmp, natural_sort_by_key, natural_sorted};
pub use text::{excel_col_name, pluralize, quote, sentence_case};
