//! Presentation layer with consumer-side view state.

/// Reusable view state holders.
pub mod widgets;

pub use widgets::UrlImageState;
