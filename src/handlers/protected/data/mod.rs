// handlers/protected/data/mod.rs - Generic entity handlers
//
// Mounted once per registered entity; the `&'static EntityDef` for the
// route arrives as a request extension.

pub mod bulk;
pub mod collection;
pub mod page;
pub mod record;
pub mod utils;

// Re-export handler functions for use in routing
pub use collection::get as collection_get;
pub use collection::post as collection_post;

pub use record::get as record_get;
pub use record::put as record_put;
pub use record::delete as record_delete;

pub use page::get as page_get;

pub use bulk::post as bulk_post;
pub use bulk::put as bulk_put;
