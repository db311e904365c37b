//! Topic structure engine.
//!
//! Derives a topic hierarchy from classified manual headings, folds it
//! according to merge rules and keeps manual reshaping edits alive across
//! regenerations.
//!
//! Layers, innermost first:
//! - [`domain`]: tree model, builder, merge engine, commands and journal
//! - [`application`]: synchronizer and export planning
//! - [`infrastructure`]: file access and service wiring
//! - [`cli`]: command line front end

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;
