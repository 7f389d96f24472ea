//! CLI command handlers. Each command is in its own file.

mod fetch;
mod find;
mod list;

pub use fetch::run_fetch;
pub use find::run_find;
pub use list::run_list;
