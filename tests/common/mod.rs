#![allow(dead_code)]

pub mod fixtures;
pub mod http;
pub mod utils;

pub use fixtures::*;
pub use http::*;
pub use utils::*;
