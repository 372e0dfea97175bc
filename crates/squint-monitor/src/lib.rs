//! Terminal interface for squint.

pub mod app;
pub mod components;
pub mod filter;
pub mod selection;
pub mod ui;

pub use app::App;
pub use ui::Theme;
