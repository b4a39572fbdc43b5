//! Message source backends.

pub mod file;
pub mod http;
pub mod memory;
pub mod postgres;

pub use file::FileSource;
pub use http::HttpSource;
pub use memory::InMemorySource;
pub use postgres::PostgresSource;
