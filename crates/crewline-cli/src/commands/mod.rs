//! CLI command implementations.

use std::path::{Path, PathBuf};

pub mod run;
pub mod validate;

/// Files read by [`load_dotenv`], highest priority first.
pub const DOTENV_FILES: [&str; 2] = [".env.local", ".env"];

/// What happened to one environment file.
#[derive(Debug)]
pub enum DotenvFile {
    Loaded(PathBuf),
    Missing(PathBuf),
    Invalid { path: PathBuf, error: String },
}

/// Load `.env.local` then `.env` from the working directory.
///
/// Variables already present in the environment win over both files.
/// Runs before logging is set up, so results are returned for
/// [`log_dotenv`] instead of being logged here.
pub fn load_dotenv() -> Vec<DotenvFile> {
    load_dotenv_from(Path::new("."))
}

pub fn load_dotenv_from(dir: &Path) -> Vec<DotenvFile> {
    DOTENV_FILES
        .iter()
        .map(|name| {
            let path = dir.join(name);
            match dotenvy::from_path(&path) {
                Ok(()) => DotenvFile::Loaded(path),
                Err(e) if e.not_found() => DotenvFile::Missing(path),
                Err(e) => DotenvFile::Invalid {
                    path,
                    error: e.to_string(),
                },
            }
        })
        .collect()
}

pub fn log_dotenv(files: &[DotenvFile]) {
    for file in files {
        match file {
            DotenvFile::Loaded(path) => {
                tracing::debug!("[CLI] Loaded environment from {}", path.display())
            }
            DotenvFile::Missing(_) => {}
            DotenvFile::Invalid { path, error } => {
                tracing::warn!("[CLI] Ignoring {}: {}", path.display(), error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dotenv_outcomes_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(".env.local"),
            "CREWLINE_DOTENV_TEST_MODEL=local-model\n",
        )
        .unwrap();
        std::fs::write(dir.path().join(".env"), "THIS LINE IS NOT AN ASSIGNMENT\n").unwrap();

        let files = load_dotenv_from(dir.path());

        assert!(matches!(&files[0], DotenvFile::Loaded(p) if p.ends_with(".env.local")));
        assert!(matches!(&files[1], DotenvFile::Invalid { path, .. } if path.ends_with(".env")));
        assert_eq!(
            std::env::var("CREWLINE_DOTENV_TEST_MODEL").as_deref(),
            Ok("local-model")
        );
        std::env::remove_var("CREWLINE_DOTENV_TEST_MODEL");
    }

    #[test]
    fn test_missing_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let files = load_dotenv_from(dir.path());
        assert!(files.iter().all(|f| matches!(f, DotenvFile::Missing(_))));
    }
}
