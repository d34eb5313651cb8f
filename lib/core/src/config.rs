use std::path::PathBuf;

/// Storage and listen configuration shared by all services.
///
/// The binary parses its own config file and hands this struct to storage
/// layer initialization. There are no embedded defaults for credentials or
/// database locations: a missing `data_dir` with no explicit `sqlite_path`
/// is a startup error, not a silent fallback.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Directory holding all persistent state for this instance.
    pub data_dir: Option<PathBuf>,

    /// Path to the SQLite database file.
    /// Defaults to `{data_dir}/data.sqlite` if not specified.
    pub sqlite_path: Option<PathBuf>,

    /// Listen address for the HTTP server.
    pub listen: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            sqlite_path: None,
            listen: "0.0.0.0:8080".to_string(),
        }
    }
}

impl ServiceConfig {
    /// Resolve the SQLite database path, falling back to `{data_dir}/data.sqlite`.
    ///
    /// Returns `None` when neither an explicit path nor a data dir is
    /// configured — callers must treat that as a fatal startup error.
    pub fn resolve_sqlite_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.sqlite_path {
            return Some(path.clone());
        }
        self.data_dir.as_ref().map(|d| d.join("data.sqlite"))
    }
}
