// handlers/public/auth/mod.rs - Token acquisition endpoints (no bearer required)

pub mod session; // POST /api/v1/login, POST /api/v1/token
pub mod user; // POST /api/v1/register

pub use session::exchange_token as session_token;
pub use session::login as session_login;
pub use user::register as user_register;
