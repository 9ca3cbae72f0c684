pub mod entity;
pub mod manager;
pub mod models;
pub mod pagination;
pub mod query_builder;
pub mod record;
pub mod repository;
pub mod store;

pub use manager::{DatabaseError, DatabaseManager};
pub use record::{FieldErrors, Record, RecordError, RecordMode};
pub use repository::{Repository, Row};
pub use store::{PgStore, Store};
