// handlers/public/auth/mod.rs - Public authentication handlers
//
// Session acquisition and release. Login and register both answer with the
// token in the body and in the `auth_token` cookie.

pub mod login;    // POST /api/auth/login
pub mod logout;   // POST /api/auth/logout
pub mod register; // POST /api/auth/register
pub mod utils;

pub use login::login_post;
pub use logout::logout_post;
pub use register::register_post;
