mod database;
mod storage;

pub use database::*;
pub use storage::*;
