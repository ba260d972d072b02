//! `ratatui-grid` draws a [`ratatui_grid_core::grid::Grid`] into a ratatui [`Buffer`].
//!
//! The engine (query pipeline, focus, selection, editing) lives in `ratatui-grid-core` and is
//! re-exported here so most apps only need this crate.
//!
//! [`Buffer`]: ratatui::buffer::Buffer
pub mod theme;

pub mod render;
pub mod viewport;

pub mod help;
pub mod view;

pub use ratatui_grid_core::aggregate;
pub use ratatui_grid_core::column;
pub use ratatui_grid_core::data;
pub use ratatui_grid_core::edit;
pub use ratatui_grid_core::error;
pub use ratatui_grid_core::events;
pub use ratatui_grid_core::focus;
pub use ratatui_grid_core::grid;
pub use ratatui_grid_core::input;
pub use ratatui_grid_core::keymap;
pub use ratatui_grid_core::l10n;
pub use ratatui_grid_core::query;
pub use ratatui_grid_core::selection;
pub use ratatui_grid_core::settings;
pub use ratatui_grid_core::validation;
pub use ratatui_grid_core::value;

#[cfg(feature = "crossterm")]
pub use ratatui_grid_core::crossterm_input;
