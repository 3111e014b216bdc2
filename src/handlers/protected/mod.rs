// handlers/protected/mod.rs - Handlers behind the access-token gate
//
// Route Prefix: /api/v1/*
// Middleware: jwt_auth_middleware (Principal available as an extension)

pub mod auth;
