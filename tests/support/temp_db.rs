use std::sync::Arc;

use skincache::adapter::outbound::sqlite::database::connection::PoolOptions;
use skincache::adapter::outbound::sqlite::SqliteConnector;
use skincache::port::StoreConnector;
use tempfile::TempDir;

/// Temporary SQLite database for integration tests.
///
/// The file lives in its own directory, removed on drop.
pub struct TempDb {
    dir: TempDir,
    url: String,
}

impl TempDb {
    pub fn create(name: &str) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let url = dir.path().join(format!("{name}.db")).display().to_string();
        Self { dir, url }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn connector(&self) -> Arc<dyn StoreConnector> {
        Arc::new(SqliteConnector::new(self.url.clone(), PoolOptions::default()))
    }
}
