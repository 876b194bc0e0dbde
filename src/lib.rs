//! Renders [tera](https://keats.github.io/tera/) templates on the command line.
//!
//! Two operations share a set of `key=value` variables:
//!
//! - [`api::render_file`] renders one template, from a file or standard input, into a file
//!   or standard output.
//! - [`api::render_tree`] mirrors a whole directory of templates into a destination
//!   directory. Every destination is validated before anything is written, and files are
//!   then rendered concurrently.
pub mod api;
pub mod config;
pub mod errors;
pub mod file;
pub mod plan;
pub mod preview;
pub mod template;
pub mod transactions;
pub mod tree;
pub mod utils;
pub mod vars;

pub use api::{plan_tree, render_file, render_tree, TempleError};
pub use config::{FileConfig, TreeConfig};
pub use vars::Vars;
