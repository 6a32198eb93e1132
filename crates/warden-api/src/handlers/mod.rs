//! HTTP request handlers
//!
//! Author: hephaex@gmail.com

pub mod auth;
pub mod health;
