#![forbid(unsafe_code)]

//! Terminal capabilities, input decoding, and event types for Hexes.
//!
//! # Role in Hexes
//! This crate holds everything about *understanding* the terminal: the
//! compiled terminfo loader, the startup probes (quirks, Unicode, color
//! depth), the key table and escape-sequence classifier, mouse report
//! parsing, and the canonical event types.
//!
//! Nothing here touches a file descriptor. Probes run over the [`probe::ProbeIo`]
//! transport and the classifiers are pure over byte slices, so the whole
//! crate is testable without a terminal. The `hexes` crate supplies the
//! actual tty plumbing.

pub mod event;
pub mod keys;
pub mod mouse;
pub mod probe;
pub mod terminfo;
