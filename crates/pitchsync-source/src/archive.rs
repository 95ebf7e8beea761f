//! Raw-page archive.
//!
//! Every vendor page fetched during a run is written under that run's
//! directory, keyed by source and page offset. A contested stat line can
//! then be traced back to the exact payloads its run saw, and the run
//! replayed from disk without refetching.

use std::path::{Path, PathBuf};

use anyhow::Context;
use sha2::{Digest, Sha256};
use tokio::fs;
use uuid::Uuid;

/// Receipt for one archived page body.
#[derive(Debug, Clone)]
pub struct StoredPage {
    pub path: PathBuf,
    pub byte_size: usize,
    pub content_hash: String,
}

#[derive(Debug, Clone)]
pub struct RawPageStore {
    root: PathBuf,
}

impl RawPageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding every page a single run fetched.
    pub fn run_dir(&self, run_id: Uuid) -> PathBuf {
        self.root.join(run_id.to_string())
    }

    fn page_path(&self, run_id: Uuid, source_id: &str, offset: u32) -> PathBuf {
        self.run_dir(run_id)
            .join(source_id)
            .join(format!("offset-{offset:06}.json"))
    }

    /// Write one page body. Writing to a temp file and renaming keeps a
    /// crashed run from leaving a torn page behind; refetching an offset
    /// within the same run replaces the earlier copy.
    pub async fn store_page(
        &self,
        run_id: Uuid,
        source_id: &str,
        offset: u32,
        bytes: &[u8],
    ) -> anyhow::Result<StoredPage> {
        let path = self.page_path(run_id, source_id, offset);
        let parent = path.parent().expect("page path always has a parent");
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating archive directory {}", parent.display()))?;

        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, bytes)
            .await
            .with_context(|| format!("writing archive page {}", temp_path.display()))?;
        fs::rename(&temp_path, &path).await.with_context(|| {
            format!(
                "publishing archive page {} -> {}",
                temp_path.display(),
                path.display()
            )
        })?;

        Ok(StoredPage {
            path,
            byte_size: bytes.len(),
            content_hash: hex::encode(Sha256::digest(bytes)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn pages_land_under_their_run_and_source() {
        let dir = tempdir().expect("tempdir");
        let store = RawPageStore::new(dir.path());
        let run_id = Uuid::new_v4();

        let first = store
            .store_page(run_id, "api-football", 0, b"{\"response\":[]}")
            .await
            .expect("first page");
        let second = store
            .store_page(run_id, "sportsdb", 100, b"{\"timeline\":[]}")
            .await
            .expect("second page");

        assert!(first.path.starts_with(store.run_dir(run_id)));
        assert!(first.path.ends_with("api-football/offset-000000.json"));
        assert!(second.path.ends_with("sportsdb/offset-000100.json"));
        assert_eq!(first.byte_size, 15);
        assert_ne!(first.content_hash, second.content_hash);

        let body = fs::read(&first.path).await.expect("read back");
        assert_eq!(body, b"{\"response\":[]}");
    }

    #[tokio::test]
    async fn refetched_offset_replaces_the_earlier_copy() {
        let dir = tempdir().expect("tempdir");
        let store = RawPageStore::new(dir.path());
        let run_id = Uuid::new_v4();

        let stale = store
            .store_page(run_id, "api-football", 0, b"{\"response\":[1]}")
            .await
            .expect("stale page");
        let fresh = store
            .store_page(run_id, "api-football", 0, b"{\"response\":[1,2]}")
            .await
            .expect("fresh page");

        assert_eq!(stale.path, fresh.path);
        assert_ne!(stale.content_hash, fresh.content_hash);
        let body = fs::read(&fresh.path).await.expect("read back");
        assert_eq!(body, b"{\"response\":[1,2]}");
    }
}
