#![doc = include_str!("../README.md")]

pub mod error;
pub mod types;
pub mod wasm;

pub use error::*;
pub use types::*;
pub use wasm::*;
