//! Utility helpers.

pub mod config;
