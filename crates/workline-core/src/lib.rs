//! Core types shared by the Workline job system and profiler.
//!
//! This crate provides the small pieces of platform glue the rest of the
//! workspace builds on:
//! - A monotonic high-resolution clock and tick conversions
//! - Bulk file I/O with chunked transfers
//! - The shared error type
//! - The invariant-violation abort path

pub mod clock;
pub mod error;
pub mod fatal;
pub mod fs;

pub use clock::{ticks_to_micros, HighResClock, Stopwatch};
pub use error::{Error, Result};
pub use fs::{read_entire_file, write_entire_file, FileHandle, SeekOrigin};
