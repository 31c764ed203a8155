//! # vaio-layout
//!
//! Layout engine for the board's responsive grid.
//!
//! Every function here is total: malformed input is dropped or defaulted,
//! never reported as an error. Stored and remote layouts pass through
//! [`normalize_layouts`] or [`sanitize_for_storage`] before they are trusted,
//! and [`synchronize_layout_and_modules`] reconciles a layout with the active
//! module list.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod grid;
pub mod items;
pub mod reconcile;
pub mod validate;

pub use grid::{
    collision_exists, columns, compute_default_position, default_item_size, fitted_item,
};
pub use items::{
    add_item_to_all_breakpoints, count_layout_items, find_layout_item,
    remove_item_from_all_breakpoints, update_item_size,
};
pub use reconcile::{Synchronized, prune_orphans, synchronize_layout_and_modules};
pub use validate::{normalize_layouts, sanitize_for_storage, validate_layout};
