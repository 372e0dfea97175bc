//! Styling.

mod theme;

pub use theme::{Theme, state_color};
