//! tests/api/main.rs

mod helpers;
mod verify;
