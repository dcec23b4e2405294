//! Property-based test suite entry point.

mod cache_props;
