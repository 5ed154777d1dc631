//! Resource provider implementations.
//!
//! Each provider implements [`crate::resources::ResourceProvider`]. The
//! local provider is always available and needs no credentials.

pub mod local;

pub use self::local::{LocalProvider, ProviderCall, ProviderOperation};
