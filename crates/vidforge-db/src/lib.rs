//! SQLite persistence for vidforge.
//!
//! Holds the two tables the server needs: `users` for credentials and
//! `videos` for the catalog. Connections come from an r2d2 pool; schema
//! changes are embedded migrations applied when the pool is created.
//!
//! ```
//! use vidforge_db::{pool::init_memory_pool, queries};
//!
//! let pool = init_memory_pool().unwrap();
//! let conn = pool.get().unwrap();
//! queries::create_user(&conn, "alice", "$2b$04$hash").unwrap();
//! assert_eq!(queries::count_users(&conn).unwrap(), 1);
//! ```

pub mod migrations;
pub mod models;
pub mod pool;
pub mod queries;

pub use pool::{get_conn, init_memory_pool, init_pool, DbPool, PooledConnection};
