//! Database and table inspection

mod database;
mod identifier;
mod table;

pub use database::*;
pub use identifier::*;
pub use table::*;

#[cfg(test)]
pub(crate) use table::tests;
