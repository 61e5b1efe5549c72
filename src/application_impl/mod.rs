mod auth_service_impl;
mod credential_hasher_argon2;
mod session_service_impl;
mod token_codec_jwt;

pub use auth_service_impl::*;
pub use credential_hasher_argon2::*;
pub use session_service_impl::*;
pub use token_codec_jwt::*;
