// Session token signing and verification for Thorken

pub mod claims;
pub mod codec;
pub mod config;
pub mod error;

pub use claims::SessionClaims;
pub use codec::{TokenCodec, is_well_formed};
pub use config::TokenConfig;
pub use error::{Result, TokenError};

// Re-export jsonwebtoken types
pub use jsonwebtoken::Algorithm;
