pub mod connection;

pub use connection::{get_database_pool, SqliteDatabase};
