#![doc = include_str!("RUSTDOC.md")]

pub mod logger;
pub mod platform;
pub mod tracker;
