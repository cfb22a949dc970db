//! Silicon model for the Rigel RV8 compute cluster.
//!
//! This crate has **no dependencies** and **no runtime behaviour**. It is a
//! pure model of the part: core count and clock, the three-tier memory map,
//! and the performance-counter numbering.
//!
//! The RV8 is a software-modeled part. The numbers here define the
//! simulation; they are not measurements of physical silicon.
//!
//! # Crate organisation
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`cluster`] | Core count, nominal clock, cycle conversion |
//! | [`mem`] | Tier map (External / Shared / Local), scratch addressing, alignment |
//! | [`perf`] | Performance-counter event numbering and mask bits |

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cluster;
pub mod mem;
pub mod perf;
