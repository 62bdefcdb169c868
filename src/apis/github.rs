use crate::apis::http::{or_empty, path_segments, web_link, ClientOptions, HttpTransport};
use crate::apis::provider::RepositoryProvider;
use crate::errors::{ProviderError, ProviderResult};
use crate::language::language_tag;
use crate::models::{
    owner_of, DirectoryEntry, EntryKind, FileContent, ProviderKind, RepoIdentifier,
    RepositoryRef, RepositorySummary, SearchHit,
};
use crate::search::snippet::native_hit_snippet;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::header::{HeaderMap, ETAG};
use reqwest::Url;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

const WEB_BASE: &str = "https://github.com";
const RAW_MEDIA_TYPE: &str = "application/vnd.github.v3.raw";

// GitHub REST models
#[derive(Debug, Deserialize)]
struct GitHubRepo {
    id: u64,
    name: String,
    full_name: String,
    html_url: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    updated_at: Option<String>,
    #[serde(default)]
    default_branch: Option<String>,
    #[serde(default)]
    language: Option<String>,
}

impl From<GitHubRepo> for RepositorySummary {
    fn from(repo: GitHubRepo) -> Self {
        RepositorySummary {
            external_id: repo.id.to_string(),
            owner: owner_of(&repo.full_name),
            name: repo.name,
            full_name: repo.full_name,
            url: repo.html_url,
            description: repo.description.unwrap_or_default(),
            updated_at: repo.updated_at.unwrap_or_default(),
            default_branch: repo.default_branch,
            primary_language: repo.language,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GitHubContentEntry {
    name: String,
    path: String,
    #[serde(rename = "type")]
    entry_type: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    html_url: Option<String>,
}

impl From<GitHubContentEntry> for DirectoryEntry {
    fn from(entry: GitHubContentEntry) -> Self {
        DirectoryEntry {
            kind: match entry.entry_type.as_str() {
                "dir" => EntryKind::Directory,
                _ => EntryKind::File,
            },
            name: entry.name,
            path: entry.path,
            size: entry.size,
            url: entry.html_url.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GitHubSearchResponse {
    #[serde(default)]
    items: Vec<GitHubSearchItem>,
}

#[derive(Debug, Deserialize)]
struct GitHubSearchItem {
    name: String,
    path: String,
}

pub struct GitHubClient {
    http: HttpTransport,
    fetch_concurrency: usize,
}

impl GitHubClient {
    pub fn new(token: &str) -> ProviderResult<Self> {
        Self::with_options(token, &ClientOptions::for_provider(ProviderKind::GitHub))
    }

    pub fn with_options(token: &str, options: &ClientOptions) -> ProviderResult<Self> {
        let http = HttpTransport::new(ProviderKind::GitHub, options, format!("token {}", token))?;
        Ok(Self {
            http,
            fetch_concurrency: options.max_concurrent_requests.max(1),
        })
    }

    pub fn base_url(&self) -> &str {
        self.http.base_url()
    }

    fn owner_and_name(repo: &RepositoryRef) -> ProviderResult<(&str, &str)> {
        match &repo.id {
            RepoIdentifier::FullName { full_name } => full_name
                .split_once('/')
                .filter(|(owner, name)| !owner.is_empty() && !name.is_empty() && !name.contains('/'))
                .ok_or_else(|| {
                    ProviderError::invalid_input(format!(
                        "GitHub repositories are addressed as owner/name, got {}",
                        full_name
                    ))
                }),
            RepoIdentifier::ProjectId { project_id } => Err(ProviderError::invalid_input(format!(
                "GitHub does not accept numeric project id {}",
                project_id
            ))),
        }
    }

    fn contents_url(&self, owner: &str, name: &str, path: &str) -> Url {
        self.http.url(
            ["repos", owner, name, "contents"]
                .into_iter()
                .chain(path_segments(path)),
        )
    }

    async fn fetch_repositories(&self) -> ProviderResult<Vec<RepositorySummary>> {
        let repos: Vec<GitHubRepo> = self
            .http
            .get_json(
                self.http.url(["user", "repos"]),
                &[("per_page", "100"), ("sort", "updated")],
            )
            .await?;
        Ok(repos.into_iter().map(RepositorySummary::from).collect())
    }

    async fn fetch_directory(
        &self,
        repo: &RepositoryRef,
        path: &str,
        branch: Option<&str>,
    ) -> ProviderResult<Vec<DirectoryEntry>> {
        let (owner, name) = Self::owner_and_name(repo)?;
        let reference = repo.resolve_branch(branch, ProviderKind::GitHub);
        let entries: Vec<GitHubContentEntry> = self
            .http
            .get_json(
                self.contents_url(owner, name, path),
                &[("ref", reference)],
            )
            .await?;
        Ok(entries.into_iter().map(DirectoryEntry::from).collect())
    }

    async fn code_search(
        &self,
        repo: &RepositoryRef,
        query: &str,
        branch: Option<&str>,
        cancel: &CancellationToken,
    ) -> ProviderResult<Vec<SearchHit>> {
        let (owner, name) = Self::owner_and_name(repo)?;
        let reference = repo.resolve_branch(branch, ProviderKind::GitHub);

        let mut q = format!("{} repo:{}/{}", query, owner, name);
        if reference != ProviderKind::GitHub.default_ref() {
            q.push_str(&format!(" ref:{}", reference));
        }

        let params = [("q", q.as_str())];
        let search = self
            .http
            .get_json::<GitHubSearchResponse>(self.http.url(["search", "code"]), &params);
        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
            response = search => response?,
        };
        debug!(repo = %repo, items = response.items.len(), "github code search");

        // The index only says which files matched; snippets need the file bodies
        let hits = stream::iter(response.items)
            .map(|item| async move {
                let snippet = match self.get_file_content(repo, &item.path, branch).await {
                    Ok(file) if file.is_text() => native_hit_snippet(&file.content, query),
                    Ok(_) => String::new(),
                    Err(err) => {
                        debug!(path = %item.path, kind = err.kind(), "no snippet for hit");
                        String::new()
                    }
                };
                SearchHit {
                    language: language_tag(&item.name),
                    path: item.path,
                    filename: item.name,
                    snippet,
                }
            })
            .buffered(self.fetch_concurrency)
            .take_until(cancel.cancelled())
            .collect()
            .await;
        Ok(hits)
    }
}

/// Blob SHA from a raw contents response; GitHub sends it as the entity tag.
fn sha_from_etag(headers: &HeaderMap) -> Option<String> {
    let etag = headers.get(ETAG)?.to_str().ok()?;
    let sha = etag.trim_start_matches("W/").trim_matches('"');
    (!sha.is_empty()).then(|| sha.to_string())
}

#[async_trait]
impl RepositoryProvider for GitHubClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::GitHub
    }

    async fn verify_credentials(&self) -> ProviderResult<()> {
        self.http.get_ok(self.http.url(["user"])).await
    }

    async fn list_repositories(&self) -> Vec<RepositorySummary> {
        or_empty(
            ProviderKind::GitHub,
            "list_repositories",
            self.fetch_repositories().await,
        )
    }

    async fn get_repository_info(
        &self,
        repo: &RepositoryRef,
    ) -> ProviderResult<RepositorySummary> {
        let (owner, name) = Self::owner_and_name(repo)?;
        let info: GitHubRepo = self
            .http
            .get_json(self.http.url(["repos", owner, name]), &[])
            .await?;
        Ok(info.into())
    }

    async fn get_file_content(
        &self,
        repo: &RepositoryRef,
        path: &str,
        branch: Option<&str>,
    ) -> ProviderResult<FileContent> {
        let (owner, name) = Self::owner_and_name(repo)?;
        let reference = repo.resolve_branch(branch, ProviderKind::GitHub);
        let path = path.trim_matches('/');

        let (headers, bytes) = self
            .http
            .get_raw(
                self.contents_url(owner, name, path),
                &[("ref", reference)],
                Some(RAW_MEDIA_TYPE),
            )
            .await?;

        let url = web_link(
            WEB_BASE,
            [owner, name, "blob", reference]
                .into_iter()
                .chain(path_segments(path)),
        );
        Ok(FileContent::from_bytes(
            path,
            bytes,
            sha_from_etag(&headers),
            url,
        ))
    }

    async fn get_directory_contents(
        &self,
        repo: &RepositoryRef,
        path: &str,
        branch: Option<&str>,
    ) -> Vec<DirectoryEntry> {
        or_empty(
            ProviderKind::GitHub,
            "get_directory_contents",
            self.fetch_directory(repo, path, branch).await,
        )
    }

    async fn search_repository_cancellable(
        &self,
        repo: &RepositoryRef,
        query: &str,
        branch: Option<&str>,
        cancel: &CancellationToken,
    ) -> Vec<SearchHit> {
        if query.trim().is_empty() {
            return Vec::new();
        }
        or_empty(
            ProviderKind::GitHub,
            "search_repository",
            self.code_search(repo, query, branch, cancel).await,
        )
    }
}
