#![allow(dead_code, unused_imports)]
pub mod fakes;
pub mod harness;
pub mod test_db;

pub use fakes::*;
pub use harness::*;
pub use test_db::*;
