//! Per-job directory and file path management

use crate::{PreviewError, ResultMap, FULL_SIZE_NAME};
use std::path::{Path, PathBuf};
use tracing::{debug, error};

/// Derives the file path for every size of one job and remembers them
///
/// A job lives at `<parent>/<name>/`; each size is written to
/// `<parent>/<name>/<size>.png`.
#[derive(Debug, Clone)]
pub struct JobPaths {
    job_path: PathBuf,
    recorded: ResultMap,
}

impl JobPaths {
    pub fn new(job_path: impl Into<PathBuf>) -> Self {
        Self {
            job_path: job_path.into(),
            recorded: ResultMap::new(),
        }
    }

    pub fn job_path(&self) -> &Path {
        &self.job_path
    }

    /// Path for `size_name`, recorded for the result map.
    pub fn path_for(&mut self, size_name: &str) -> PathBuf {
        let path = self.job_path.join(format!("{size_name}.png"));
        self.recorded.insert(size_name.to_string(), path.clone());
        path
    }

    pub fn full_path(&mut self) -> PathBuf {
        self.path_for(FULL_SIZE_NAME)
    }

    /// Every path handed out so far, keyed by size name
    pub fn into_result_map(self) -> ResultMap {
        self.recorded
    }

    /// Create the job directory and its parents; an existing directory is fine.
    pub async fn ensure_job_directory(&self) -> Result<(), PreviewError> {
        tokio::fs::create_dir_all(&self.job_path).await.map_err(|e| {
            error!("Error creating job directory {}: {}", self.job_path.display(), e);
            PreviewError::ResourceUnavailable(format!(
                "cannot create job directory {}: {e}",
                self.job_path.display()
            ))
        })?;

        debug!("Job directory ready: {}", self.job_path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn test_path_for_is_deterministic() {
        let mut paths = JobPaths::new("/tmp/previews/job1");
        assert_eq!(
            paths.path_for("thumb"),
            PathBuf::from("/tmp/previews/job1/thumb.png")
        );
        assert_eq!(paths.path_for("thumb"), paths.path_for("thumb"));
        assert_eq!(
            paths.full_path(),
            PathBuf::from("/tmp/previews/job1/full.png")
        );
    }

    #[test]
    fn test_into_result_map_holds_every_recorded_path() {
        let mut paths = JobPaths::new("/tmp/previews/job1");
        let full = paths.full_path();
        let thumb = paths.path_for("thumb");
        paths.path_for("thumb");

        let map = paths.into_result_map();
        assert_eq!(map.len(), 2);
        assert_eq!(map["full"], full);
        assert_eq!(map["thumb"], thumb);
    }

    #[tokio::test]
    async fn test_ensure_job_directory_is_idempotent() {
        let temp_dir = tempfile::tempdir().unwrap();
        let paths = JobPaths::new(temp_dir.path().join("nested").join("job"));

        paths.ensure_job_directory().await.unwrap();
        paths.ensure_job_directory().await.unwrap();
        assert!(paths.job_path().is_dir());
    }

    #[tokio::test]
    async fn test_ensure_job_directory_fails_under_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let blocker = temp_dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let paths = JobPaths::new(blocker.join("job"));
        let err = paths.ensure_job_directory().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResourceUnavailable);
    }
}
