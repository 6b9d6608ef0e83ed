// ============================
// credgate-lib/src/auth/mod.rs
// ============================
//! Authentication and credential lifecycle.

pub mod lockout;
pub mod password;
pub mod reset;
pub mod token_generator;
mod service;
mod service_impl;


pub use password::CredentialHasher;
pub use service::AuthService;
pub use service_impl::DefaultAuth;
pub use token_generator::{generate_secure_token, hash_token};
