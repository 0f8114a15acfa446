//! Durable storage for the bookshelf service: one JSON file holding the whole
//! collection, and one directory holding uploaded images.

pub mod error;
pub mod images;
pub mod records;

pub use error::StorageError;
pub use images::ImageStore;
pub use records::{RecordRepository, RecordStore};
