//! Bookshelf application library
//!
//! Book catalog modules and the helpers they share.

pub mod modules;
pub mod utils;
