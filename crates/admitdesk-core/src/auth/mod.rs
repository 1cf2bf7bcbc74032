//! Authentication state for the admissions console.
//!
//! - `Session`: the access/refresh token pair, persisted to the cache
//!   directory so separate CLI invocations share a login
//! - `CredentialStore`: optional OS keychain storage for the password
//!
//! A missing refresh token means the user has to log in again.

pub mod credentials;
pub mod session;

pub use credentials::CredentialStore;
pub use session::{AuthRequired, Session, SessionTokens};
