use std::error::Error;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

const DB_FILE: &str = "keyledger.db";

/// Uses `configured` when given, otherwise a SQLite file under `data_dir`.
/// SQLite files are created on demand.
pub(crate) fn resolve_dsn(
    configured: Option<&str>,
    data_dir: &str,
) -> Result<String, Box<dyn Error + Send + Sync>> {
    let dsn = match configured.map(str::trim).filter(|dsn| !dsn.is_empty()) {
        Some(dsn) => dsn.to_string(),
        None => default_dsn(Path::new(data_dir)),
    };
    if let Some(path) = sqlite_file_path(&dsn) {
        ensure_file(&path)?;
    }
    Ok(dsn)
}

fn default_dsn(data_dir: &Path) -> String {
    let path = data_dir.join("db").join(DB_FILE);
    let path = path.to_string_lossy();
    match path.strip_prefix('/') {
        Some(absolute) => format!("sqlite:///{absolute}?mode=rwc"),
        None => format!("sqlite://{path}?mode=rwc"),
    }
}

fn sqlite_file_path(dsn: &str) -> Option<PathBuf> {
    let rest = dsn.strip_prefix("sqlite:")?;
    let path = rest.split(['?', '#']).next()?.trim();
    let path = path.strip_prefix("//").unwrap_or(path);
    if path.is_empty() || path.eq_ignore_ascii_case(":memory:") || path == "memory:" {
        return None;
    }
    Some(PathBuf::from(path))
}

fn ensure_file(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    if !path.exists() {
        OpenOptions::new().create(true).append(true).open(path)?;
    }
    Ok(())
}
