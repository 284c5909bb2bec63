//! Terminal output for the `wiremock-state` binary

pub mod icons;
pub mod output;
pub mod table;
pub mod theme;

pub use icons::Icons;
pub use output::{dim, header, info, key_row, muted, section, success, summary_row, warn};
pub use table::{stats_table, TableBuilder};
pub use theme::{theme, Theme};
