use duckdb::Connection;
use r2d2::ManageConnection;

/// r2d2 adapter for DuckDB connections.
///
/// DuckDB statements are not Send, so connections checked out of the pool
/// must only be used inside `tokio::task::spawn_blocking`.
pub struct DuckDbConnectionManager {
    connection_string: String,
}

impl DuckDbConnectionManager {
    pub fn new(connection_string: String) -> Self {
        Self { connection_string }
    }
}

impl ManageConnection for DuckDbConnectionManager {
    type Connection = Connection;
    type Error = duckdb::Error;

    fn connect(&self) -> Result<Self::Connection, Self::Error> {
        Connection::open(&self.connection_string)
    }

    fn is_valid(&self, conn: &mut Self::Connection) -> Result<(), Self::Error> {
        conn.execute("SELECT 1", [])?;
        Ok(())
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}
