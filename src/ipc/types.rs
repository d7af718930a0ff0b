use crate::db;
use rusqlite::Connection;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// One protocol line: `{ "id", "method", "params" }`.
#[derive(Debug, Deserialize)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// The selected workspace. At most one database handle is held at a time.
#[derive(Default)]
pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
}

impl AppState {
    /// Releases the handle so the file can be replaced or another workspace opened.
    pub fn close(&mut self) {
        self.db = None;
        self.workspace = None;
    }

    pub fn open(&mut self, path: &Path) -> anyhow::Result<&Connection> {
        self.close();
        let conn = db::open_db(path)?;
        self.workspace = Some(path.to_path_buf());
        Ok(self.db.insert(conn))
    }
}
