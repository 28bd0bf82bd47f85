//! WAL segment codec tests

mod entry_tests;
