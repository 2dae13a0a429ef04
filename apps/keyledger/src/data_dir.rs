const DEFAULT_DATA_DIR: &str = "./data";

/// Directory that holds the default SQLite database.
pub(crate) fn resolve_data_dir(configured: Option<&str>) -> String {
    configured
        .map(str::trim)
        .filter(|dir| !dir.is_empty())
        .unwrap_or(DEFAULT_DATA_DIR)
        .to_string()
}
