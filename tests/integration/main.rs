//! Integration tests over the public hidhub API

mod config_tests;
mod trigger_tests;
