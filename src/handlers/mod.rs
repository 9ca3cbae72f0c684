// handlers/mod.rs - Two-tier handler layout
//
// Public (no auth) → Protected (JWT auth, actor injected by middleware)
pub mod public;    // /api/auth/{register,login,logout}, portfolio, waitlist
pub mod protected; // /api/auth/me and everything else under /api/v1
