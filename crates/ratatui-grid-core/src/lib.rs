//! `ratatui-grid-core` is the headless engine behind `ratatui-grid`.
//!
//! It owns everything a data grid decides without drawing anything: the query pipeline, the
//! focus regions, row selection, the edit lifecycle and the footer aggregates. Rendering lives in
//! the facade crate.
//!
//! ## Design goals
//!
//! - Event-loop agnostic: you drive input and rendering from your app.
//! - No async runtime: remote data access is handed back as futures ([`grid::FetchTask`],
//!   [`grid::SaveTask`]) that your app awaits on whatever executor it already runs. In-memory
//!   sources settle inline.
//! - Copy is app-controlled: the grid emits [`grid::GridAction::CopyRequested`] and the caller
//!   decides how to integrate with a clipboard.
//!
//! ## Getting started
//!
//! Most users should depend on the facade crate `ratatui-grid`. Use this crate directly if you
//! render the grid yourself.
//!
//! Useful entry points:
//! - [`grid::Grid`]: the coordinator. Construct it with [`grid::Grid::local`] or
//!   [`grid::Grid::remote`] and call [`grid::Grid::init`].
//! - [`query::QueryBuilder`] and [`query::execute_local`]: the query pipeline on its own.
//! - [`data::DataProvider`]: implement this for remote sources.
//! - [`focus::Presenter`]: receives focus outlines and tooltips.
//!
//! ## Tasks
//!
//! ```ignore
//! let mut next = grid.init();
//! while let Some(task) = next {
//!     next = grid.settle_fetch(task.await);
//! }
//! ```
pub mod aggregate;
pub mod column;
pub mod data;
pub mod edit;
pub mod error;
pub mod events;
pub mod focus;
pub mod grid;
pub mod l10n;
pub mod query;
pub mod reconcile;
pub mod selection;
pub mod settings;
pub mod validation;
pub mod value;

#[cfg(feature = "crossterm")]
pub mod crossterm_input;

pub mod input;
pub mod keymap;
