//! concierge-tui: Terminal UI components
//!
//! Widgets for a chat surface built on ratatui and crossterm: a scrollback
//! of conversation turns, a single-line input and a status spinner.

pub mod input;
pub mod theme;
pub mod widgets;

pub use theme::Theme;
