//! # kubegen tree
//!
//! Mutable document model for the macro engine.
//!
//! - [`ValueTree`]: arena-backed JSON document with typed reads, path-based
//!   `set`/`delete`/`overlay` and node handles
//! - [`Branch`] / [`BranchTracker`]: walk-time path tracking
//! - [`Visitor`] / [`walk_tree`]: depth-first traversal building branches
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kubegen_tree::{Key, ValueTree};
//! use serde_json::json;
//!
//! let mut tree = ValueTree::from_slice(br#"{"Kind": "Service", "ports": [80]}"#)?;
//! tree.set(&[Key::from("ports"), Key::from(1)], json!(443))?;
//! tree.overlay(&json!({"Kind": "Ignored", "labels": {}}), &[])?;
//! ```

pub mod branch;
pub mod error;
pub mod key;
pub mod kind;
pub mod overlay;
pub mod result;
pub mod tree;
pub mod visitor;

pub use branch::{Branch, BranchId, BranchTracker};
pub use error::*;
pub use key::{render_path, Key};
pub use kind::Kind;
pub use result::*;
pub use tree::{NodeId, ValueTree};
pub use visitor::{walk_tree, Visitor};
