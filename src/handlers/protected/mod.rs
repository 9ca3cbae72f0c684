// handlers/protected/mod.rs - Protected handlers (JWT authentication required)
//
// Every route here sits behind `jwt_auth_middleware`, which verifies the
// bearer token or `auth_token` cookie and injects the caller as an
// `Extension<Actor>`. Role and ownership checks happen in the handlers.

pub mod auth;      // GET /api/auth/me
pub mod companies; // GET /api/v1/companies/size
pub mod data;      // Generic entity CRUD, pages, bulk and batch
pub mod images;    // GET /api/v1/images/search
pub mod jobs;      // PUT /api/v1/jobs/:id/{skills,questions}
pub mod uploads;   // POST/DELETE /api/v1/uploads
