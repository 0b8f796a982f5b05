//! GoMen core library — request guards for the GoMen REST API.
//!
//! `gomen-core` holds the stateful pieces of the request pipeline with no
//! dependency on an HTTP stack, so each can be exercised directly in tests
//! and wired into any server.
//!
//! # Modules
//!
//! - [`auth`] — Bearer header parsing, signed token issue/verify
//!   ([`TokenAuthenticator`]), and [`AuthMode`].
//! - [`rate_limit`] — Fixed-window [`RateLimiter`] and its background sweeper.
//! - [`error`] — [`AuthError`], [`QuotaExceeded`], and [`CoreError`] with the
//!   [`CoreResult`] alias.

pub mod auth;
pub mod error;
pub mod rate_limit;

pub use auth::{AuthMode, Claims, Identity, IssuedToken, TokenAuthenticator};
pub use error::{AuthError, CoreError, CoreResult, QuotaExceeded};
pub use rate_limit::{RateLimiter, SweeperHandle, Visitor};
