//! API handlers
//!
//! Author: hephaex@gmail.com

pub mod accounts;
pub mod health;
