//! Integration tests for the model module.
//!
//! These tests build small models, load them into a session and step them,
//! covering graph wiring, Godley installation and accounting checks.

#[cfg(test)]
mod godley;
