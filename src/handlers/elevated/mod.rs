// handlers/elevated/mod.rs - Administrator-only handlers
//
// Middleware: hinted_auth_middleware + require_admin_middleware

pub mod users;

pub use users::list_users;
