//! Fixtures shared by the cells' integration tests.

pub mod test_utils;
