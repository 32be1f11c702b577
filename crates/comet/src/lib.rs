#![doc = include_str!("../README.md")]

mod action;
mod diff;
mod error;
mod types;

pub mod v1 {
    //! Versioned public API for notebook change detection.
    //!
    //! # Documents
    //!
    //! - [`Notebook`] — ordered cells plus untouched notebook metadata
    //! - [`Cell`] / [`CellType`] — markdown, code, or raw
    //! - [`Output`] / [`OutputType`] / [`OutputPayload`] — typed code-cell
    //!   outputs and the part of each that takes part in equality
    //!
    //! # Actions
    //!
    //! - [`Action`] — one front-end edit event with the resulting notebook
    //! - [`ActionName`] — recognized action names plus a catch-all
    //! - [`resolve`] — action → candidate cell indices
    //!
    //! # Comparison
    //!
    //! - [`diff`] / [`diff_all`] — candidate indices → [`DiffResult`]
    //! - [`CometError`] — malformed selections and documents
    pub use crate::action::{Action, ActionName, resolve};
    pub use crate::diff::{DiffResult, diff, diff_all};
    pub use crate::error::{CometError, Result};
    pub use crate::types::{Cell, CellType, MimeBundle, Notebook, Output, OutputPayload, OutputType};
}
