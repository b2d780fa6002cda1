//! Fixtures and an interpreter shared by the unit tests.

pub mod fixtures;
pub mod machine;
