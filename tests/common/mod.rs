#![allow(dead_code)]

// Test utilities and common setup
pub mod builders;
pub mod mocks;

pub use builders::*;
pub use mocks::*;
