//! Durable local storage for add-to-homescreen sessions, one SQLite
//! database per origin.

pub mod error;
pub mod origin;
pub mod schema;
pub mod store;

pub use error::{Result, StoreError};
pub use origin::{OriginStore, default_base_dir, extract_origin, list_origins};
pub use store::Store;
