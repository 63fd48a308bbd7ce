//! Helpers shared by the unit tests

pub mod test_utils;
