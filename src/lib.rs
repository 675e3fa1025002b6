//! # kiji
//!
//! A library for converting JATS scholarly-article XML into a normalized,
//! typed document model.
//!
//! ## Features
//!
//! - Tolerant XML parsing with encoding detection (UTF-8, declared
//!   encodings, Windows-1252 fallback)
//! - Structural canonicalization of publisher-specific JATS variants
//! - Rule-driven mapping of body markup to typed nodes with text marks
//! - Globally unique identifier assignment with cross-reference remapping
//! - Review-comment markers preserved as standalone annotation nodes with
//!   exact text offsets
//!
//! ## Quick Start
//!
//! ```no_run
//! let xml = std::fs::read("article.xml").unwrap();
//! let conversion = kiji::convert_article(&xml).unwrap();
//! for node in &conversion.nodes {
//!     println!("{} {}", node.node_type.name(), node.id);
//! }
//! for warning in &conversion.warnings {
//!     eprintln!("warning: {warning}");
//! }
//! ```
//!
//! The output is a flat list of [`ModelNode`]s: parents carry a `children`
//! reference list, so the tree can be rebuilt or stored relationally.

pub mod convert;
pub mod dom;
pub mod error;
pub mod model;
pub(crate) mod util;

pub use convert::{Conversion, convert_article};
pub use error::{Error, Result};
pub use model::{ModelNode, NodeType, Value};
