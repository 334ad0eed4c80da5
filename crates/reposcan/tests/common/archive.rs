//! In-memory archive provider.
//!
//! `FakeProvider` serves ZIP archives registered per slug, shaped like the
//! real provider downloads: every file sits under one `owner-repo-sha/`
//! folder and arrives in several chunks.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use zip::write::SimpleFileOptions;

use reposcan::provider::{ArchiveStream, GitProvider, ProviderKind};
use reposcan::{Result, ScanError};

/// Chunk size the fake streams archives in.
const CHUNK: usize = 512;

/// Builds a ZIP holding `files` under the `top/` folder.
pub fn zip_tree(top: &str, files: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in files {
        writer
            .start_file(format!("{}/{}", top, name), SimpleFileOptions::default())
            .expect("Failed to start zip entry");
        writer
            .write_all(content.as_bytes())
            .expect("Failed to write zip entry");
    }
    writer
        .finish()
        .expect("Failed to finish zip")
        .into_inner()
}

pub struct FakeProvider {
    kind: ProviderKind,
    archives: Mutex<HashMap<String, Vec<u8>>>,
    delay: Duration,
    downloads: AtomicUsize,
}

impl FakeProvider {
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            archives: Mutex::new(HashMap::new()),
            delay: Duration::ZERO,
            downloads: AtomicUsize::new(0),
        }
    }

    /// Delays every archive download, to keep jobs in flight concurrently.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Serves `archive` for `slug`. Unknown slugs are "not found".
    pub fn serve(&self, slug: &str, archive: Vec<u8>) {
        self.archives
            .lock()
            .expect("archives lock")
            .insert(slug.to_string(), archive);
    }

    pub fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    fn archive(&self, slug: &str) -> Result<Vec<u8>> {
        self.archives
            .lock()
            .expect("archives lock")
            .get(slug)
            .cloned()
            .ok_or_else(|| ScanError::RepositoryNotFound {
                provider: self.kind,
                slug: slug.to_string(),
            })
    }
}

#[async_trait]
impl GitProvider for FakeProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn default_branch(&self, slug: &str) -> Result<String> {
        self.archive(slug)?;
        Ok("main".to_string())
    }

    async fn archive_stream(&self, slug: &str, _git_ref: &str) -> Result<ArchiveStream> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let archive = self.archive(slug)?;
        self.downloads.fetch_add(1, Ordering::SeqCst);

        let chunks: Vec<Result<Bytes>> = archive
            .chunks(CHUNK)
            .map(|chunk| Ok(Bytes::copy_from_slice(chunk)))
            .collect();
        Ok(futures_util::stream::iter(chunks).boxed())
    }
}
