//! Utilities for memory-efficient data structures.
//!
//! This module provides low-level utilities used internally by the runtime.
//! In particular, it exposes a generational [`Slab`] used for task frames
//! and timer registrations, where a stale key must never reach a slot that
//! has since been reused.

mod slab;

pub(crate) use slab::{Key, Slab};
