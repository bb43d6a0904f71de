//! Open Payments client core.
//!
//! This crate implements the client side of the two protocols every Open
//! Payments interaction rests on:
//!
//! - **RFC 9421 HTTP Message Signatures**: every outbound request is signed
//!   with the client's Ed25519 key so resource and authorization servers can
//!   verify who is calling. See [`signature`].
//! - **GNAP (RFC 9635)**: access tokens are obtained by negotiating a grant
//!   with the wallet's authorization server, optionally via an interactive
//!   consent redirect. See [`grant`].
//!
//! The two are threaded together by [`client::OpenPaymentsClient`]: a logical
//! resource operation is shaped into an immutable [`http::HttpRequest`], run
//! through an ordered interceptor pipeline (authentication header, signing,
//! logging with secret redaction), executed by an injected [`http::Transport`],
//! and the response flows back through logging and structured error
//! extraction.
//!
//! The core holds no server-side state, persists nothing to disk, and never
//! spawns background tasks; all IO-bound operations are plain `async fn`s and
//! dropping a future aborts the in-flight transport call.

pub mod client;
pub mod clock;
pub mod error;
pub mod grant;
pub mod http;
pub mod signature;
pub mod wallet;

pub use {
    client::{OpenPaymentsClient, OpenPaymentsClientBuilder},
    error::{Error, Result},
};
