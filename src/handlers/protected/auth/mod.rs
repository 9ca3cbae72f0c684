pub mod me;

// Re-export handler functions for use in routing
pub use me::get as me_get;
