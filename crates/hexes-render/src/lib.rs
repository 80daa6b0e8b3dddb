#![forbid(unsafe_code)]

//! Render kernel: cells, buffers, damage, and ANSI presentation.
//!
//! # Role in Hexes
//! Everything about *producing* terminal output lives here: the cell and
//! color model, the pending/shadow grid type with clipped blits and fills,
//! per-cell damage tracking, pure ANSI byte generation, and the presenter
//! that turns a damaged pending buffer into the smallest correct byte
//! stream.
//!
//! The crate never touches a file descriptor; the presenter writes into any
//! [`std::io::Write`], which is what keeps the diff engine byte-for-byte
//! testable.

pub mod ansi;
pub mod buffer;
pub mod cell;
pub mod damage;
pub mod presenter;
