//! # tusker-core
//!
//! Durable outbound queues and the send engine for the `tusker` Mastodon
//! client.
//!
//! A user queues intentions — favourites, boosts, removals, drafts with
//! attachments and threading — while offline or rate-limited; a later
//! `sync` drains the queues against the instance in order, with bounded
//! retries and partial-failure bookkeeping that survives the process.
//!
//! The pieces:
//!
//! - [`filebacked`] — scoped text files that rewrite themselves (keeping a
//!   `.bak` copy) when they go out of scope. Every durable piece of state
//!   rides on it.
//! - [`options`] — typed per-account settings over a `key=value` file.
//! - [`accounts`] — account-directory discovery and unambiguous-prefix
//!   lookup.
//! - [`queues`] — the `fav`/`boost`/`post` queue files and their
//!   inversion-on-append algebra.
//! - [`outgoing`] — the draft-status file format.
//! - [`net`] — the injected network contract the engine is generic over.
//! - [`engine`] — ordered dispatch with retries, reply threading, and
//!   head-only progress persistence.

pub mod accounts;
pub mod engine;
pub mod filebacked;
pub mod net;
pub mod options;
pub mod outgoing;
pub mod queues;
