// handlers/public/mod.rs - Public handlers (no authentication required)
//
// Token acquisition plus the two anonymous read/write surfaces: the public
// portfolio and the waitlist. No actor is available here, so every input is
// validated from scratch.

pub mod auth;
pub mod portfolio; // GET /api/v1/portfolio/:username
pub mod waitlist;  // POST /api/v1/waitlist

pub use portfolio::get as portfolio_get;
pub use waitlist::post as waitlist_post;
