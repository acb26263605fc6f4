//! Store module - relational staging of the cleaned sales table

mod sqlite;

pub use sqlite::SalesStore;
