//! Test fixtures
//!
//! Low-difficulty configs, pre-funded chains and throwaway stores shared by
//! the unit tests across the crate.

pub mod test_utils;

pub use test_utils::*;
