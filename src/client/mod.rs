//! The client facade, its connection pool, and the per-connection
//! request/response machinery that backs them.

mod client;
mod conn;
mod connect;
mod pool;

pub use self::client::Client;
