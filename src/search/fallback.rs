//! Substring search for providers without a code search endpoint.
//!
//! Walks the repository tree depth-first through directory listings, fetches every
//! file and keeps the ones containing the query. Directory depth is unbounded
//! unless `SearchOptions::max_depth` is set, and nothing is cached between calls.

use crate::apis::provider::RepositoryProvider;
use crate::language::language_tag;
use crate::models::{DirectoryEntry, EntryKind, RepositoryRef, SearchHit};
use crate::search::snippet::extract_snippet;
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// File fetches kept in flight at once
    pub concurrency: usize,
    /// Deepest directory level to descend into; the root is level 0
    pub max_depth: Option<usize>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            concurrency: 4,
            max_depth: None,
        }
    }
}

pub struct RecursiveSearch<'a, P: RepositoryProvider + ?Sized> {
    provider: &'a P,
    options: SearchOptions,
}

impl<'a, P: RepositoryProvider + ?Sized> RecursiveSearch<'a, P> {
    pub fn new(provider: &'a P, options: SearchOptions) -> Self {
        Self { provider, options }
    }

    /// Every file reachable from the root, in directory listing order.
    pub async fn collect_files(
        &self,
        repo: &RepositoryRef,
        branch: Option<&str>,
        cancel: &CancellationToken,
    ) -> Vec<DirectoryEntry> {
        self.walk(repo, String::new(), branch, 0, cancel).await
    }

    /// Hits in traversal order. Files that fail to fetch are skipped; after
    /// cancellation the hits found so far are returned.
    pub async fn run(
        &self,
        repo: &RepositoryRef,
        query: &str,
        branch: Option<&str>,
        cancel: &CancellationToken,
    ) -> Vec<SearchHit> {
        if query.trim().is_empty() {
            return Vec::new();
        }

        let files = self.collect_files(repo, branch, cancel).await;
        debug!(repo = %repo, files = files.len(), "scanning repository files");

        stream::iter(files)
            .map(|file| async move {
                if cancel.is_cancelled() {
                    return None;
                }
                match self.provider.get_file_content(repo, &file.path, branch).await {
                    Ok(fetched) if !fetched.is_text() => {
                        debug!(path = %file.path, "skipping binary file");
                        None
                    }
                    Ok(fetched) => {
                        extract_snippet(&fetched.content, query).map(|snippet| SearchHit {
                            language: language_tag(&file.name),
                            path: file.path,
                            filename: file.name,
                            snippet,
                        })
                    }
                    Err(err) => {
                        debug!(path = %file.path, kind = err.kind(), "skipping file");
                        None
                    }
                }
            })
            .buffered(self.options.concurrency.max(1))
            .take_until(cancel.cancelled())
            .filter_map(|hit| async move { hit })
            .collect()
            .await
    }

    fn walk<'s>(
        &'s self,
        repo: &'s RepositoryRef,
        path: String,
        branch: Option<&'s str>,
        depth: usize,
        cancel: &'s CancellationToken,
    ) -> BoxFuture<'s, Vec<DirectoryEntry>> {
        async move {
            let mut files = Vec::new();
            if cancel.is_cancelled() {
                return files;
            }

            let entries = self
                .provider
                .get_directory_contents(repo, &path, branch)
                .await;
            for entry in entries {
                match entry.kind {
                    EntryKind::File => files.push(entry),
                    EntryKind::Directory => {
                        if self.options.max_depth.is_some_and(|max| depth >= max) {
                            debug!(path = %entry.path, "max depth reached");
                            continue;
                        }
                        let nested = self.walk(repo, entry.path, branch, depth + 1, cancel).await;
                        files.extend(nested);
                    }
                }
            }
            files
        }
        .boxed()
    }
}
