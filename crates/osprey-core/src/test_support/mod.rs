//! Module: test_support
//! Responsibility: shared fixtures and the in-memory collection the
//! integration tests execute translated models against.
//! Does not own: assertions; tests make their own.
//! Boundary: compiled for tests only, never shipped.

pub(crate) mod fixtures;
pub(crate) mod store;
