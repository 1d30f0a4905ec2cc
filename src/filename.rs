use std::path::{Path, PathBuf};

/// Path of the table file with the given number: `{dir}/{file_id:06}.sst`.
pub fn table_file_name(dir: &Path, file_id: u64) -> PathBuf {
    dir.join(format!("{file_id:06}.sst"))
}

/// Inverse of [`table_file_name`]: the file number, if the name is a table file.
pub fn parse_table_file_name(name: &str) -> Option<u64> {
    name.strip_suffix(".sst")?.parse().ok()
}
