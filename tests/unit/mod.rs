//! Unit test harness for palletizer-motion.
//!
//! This module organizes public-API unit tests for each component of the
//! library.

mod config_parsing;
mod config_validation;
mod properties;
