//! TUI components.

pub mod footer;
pub mod header;
pub mod job_table;
pub mod popup;

pub use footer::{Footer, StatusLine};
pub use header::Header;
pub use job_table::JobTable;
pub use popup::{ConfirmAction, PasswordField, PasswordForm, Popup};
