//! Value and series tests
