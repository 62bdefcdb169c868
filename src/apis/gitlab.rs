use crate::apis::http::{or_empty, path_segments, web_link, ClientOptions, HttpTransport};
use crate::apis::provider::RepositoryProvider;
use crate::errors::{ProviderError, ProviderResult};
use crate::language::language_tag;
use crate::models::{
    basename, owner_of, DirectoryEntry, EntryKind, FileContent, ProviderKind, RepoIdentifier,
    RepositoryRef, RepositorySummary, SearchHit,
};
use crate::search::snippet::{extract_snippet, preview};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Tree pages fetched per listing before giving up on a runaway cursor.
const MAX_TREE_PAGES: usize = 1000;

// GitLab REST models
#[derive(Debug, Deserialize)]
struct GitLabProject {
    id: u64,
    name: String,
    path_with_namespace: String,
    web_url: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    last_activity_at: Option<String>,
    #[serde(default)]
    default_branch: Option<String>,
}

impl From<GitLabProject> for RepositorySummary {
    fn from(project: GitLabProject) -> Self {
        RepositorySummary {
            external_id: project.id.to_string(),
            owner: owner_of(&project.path_with_namespace),
            name: project.name,
            full_name: project.path_with_namespace,
            url: project.web_url,
            description: project.description.unwrap_or_default(),
            updated_at: project.last_activity_at.unwrap_or_default(),
            default_branch: project.default_branch,
            // Needs a separate /languages call per project
            primary_language: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GitLabFile {
    #[serde(default)]
    encoding: Option<String>,
    content: String,
    #[serde(default)]
    blob_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitLabTreeEntry {
    name: String,
    path: String,
    #[serde(rename = "type")]
    entry_type: String,
}

#[derive(Debug, Deserialize)]
struct GitLabBlobHit {
    path: String,
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    data: String,
}

/// Bytes of the `content` field of a repository file response.
///
/// Only `base64` is decoded; any other encoding is taken as the literal text.
pub fn decode_file_content(encoding: Option<&str>, content: String) -> ProviderResult<Vec<u8>> {
    if encoding != Some("base64") {
        return Ok(content.into_bytes());
    }
    let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| ProviderError::malformed(format!("Invalid base64 file content: {}", e)))
}

pub struct GitLabClient {
    http: HttpTransport,
    web_base: String,
}

impl GitLabClient {
    pub fn new(token: &str) -> ProviderResult<Self> {
        Self::with_options(token, &ClientOptions::for_provider(ProviderKind::GitLab))
    }

    pub fn with_options(token: &str, options: &ClientOptions) -> ProviderResult<Self> {
        let http = HttpTransport::new(ProviderKind::GitLab, options, format!("Bearer {}", token))?;
        let web_base = options
            .base_url
            .trim_end_matches('/')
            .trim_end_matches("/api/v4")
            .to_string();
        Ok(Self { http, web_base })
    }

    pub fn base_url(&self) -> &str {
        self.http.base_url()
    }

    /// Numeric id, or the namespaced path which GitLab accepts URL-encoded.
    fn project_segment(repo: &RepositoryRef) -> ProviderResult<String> {
        match &repo.id {
            RepoIdentifier::ProjectId { project_id } => Ok(project_id.to_string()),
            RepoIdentifier::FullName { full_name } if full_name.contains('/') => {
                Ok(full_name.trim_matches('/').to_string())
            }
            RepoIdentifier::FullName { full_name } => Err(ProviderError::invalid_input(format!(
                "GitLab projects need a numeric id or namespace/path, got {}",
                full_name
            ))),
        }
    }

    /// Browser URL for a path, or the raw API URL when only the numeric id is known.
    fn web_url(&self, repo: &RepositoryRef, view: &str, reference: &str, path: &str) -> String {
        match &repo.id {
            RepoIdentifier::FullName { full_name } => web_link(
                &self.web_base,
                path_segments(full_name)
                    .chain(["-", view, reference])
                    .chain(path_segments(path)),
            ),
            RepoIdentifier::ProjectId { project_id } => {
                let project = project_id.to_string();
                let mut url = self.http.url([
                    "projects",
                    project.as_str(),
                    "repository",
                    "files",
                    path,
                    "raw",
                ]);
                url.query_pairs_mut().append_pair("ref", reference);
                url.to_string()
            }
        }
    }

    async fn fetch_projects(&self) -> ProviderResult<Vec<RepositorySummary>> {
        let projects: Vec<GitLabProject> = self
            .http
            .get_json(
                self.http.url(["projects"]),
                &[
                    ("membership", "true"),
                    ("per_page", "100"),
                    ("order_by", "last_activity_at"),
                ],
            )
            .await?;
        Ok(projects.into_iter().map(RepositorySummary::from).collect())
    }

    async fn fetch_tree(
        &self,
        repo: &RepositoryRef,
        path: &str,
        branch: Option<&str>,
    ) -> ProviderResult<Vec<DirectoryEntry>> {
        let project = Self::project_segment(repo)?;
        let reference = repo.resolve_branch(branch, ProviderKind::GitLab);
        let path = path.trim_matches('/');

        let url = self
            .http
            .url(["projects", project.as_str(), "repository", "tree"]);
        let mut entries: Vec<GitLabTreeEntry> = Vec::new();
        let mut page = "1".to_string();
        for _ in 0..MAX_TREE_PAGES {
            let (headers, batch): (_, Vec<GitLabTreeEntry>) = self
                .http
                .get_json_with_headers(
                    url.clone(),
                    &[
                        ("path", path),
                        ("ref", reference),
                        ("per_page", "100"),
                        ("page", page.as_str()),
                    ],
                )
                .await?;
            entries.extend(batch);

            // Empty on the last page
            match headers
                .get("x-next-page")
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|next| !next.is_empty() && *next != page)
            {
                Some(next) => page = next.to_string(),
                None => break,
            }
            debug!(path, page = %page, "following tree page");
        }

        Ok(entries
            .into_iter()
            .map(|entry| {
                let (kind, view) = match entry.entry_type.as_str() {
                    "tree" => (EntryKind::Directory, "tree"),
                    _ => (EntryKind::File, "blob"),
                };
                DirectoryEntry {
                    url: self.web_url(repo, view, reference, &entry.path),
                    name: entry.name,
                    path: entry.path,
                    kind,
                    // The tree endpoint does not report sizes
                    size: 0,
                }
            })
            .collect())
    }

    async fn blob_search(
        &self,
        repo: &RepositoryRef,
        query: &str,
        branch: Option<&str>,
    ) -> ProviderResult<Vec<SearchHit>> {
        let project = Self::project_segment(repo)?;
        let reference = repo.resolve_branch(branch, ProviderKind::GitLab);

        let blobs: Vec<GitLabBlobHit> = self
            .http
            .get_json(
                self.http.url(["projects", project.as_str(), "search"]),
                &[("scope", "blobs"), ("search", query), ("ref", reference)],
            )
            .await?;

        Ok(blobs
            .into_iter()
            .map(|blob| {
                let filename = blob
                    .filename
                    .filter(|f| !f.is_empty())
                    .unwrap_or_else(|| basename(&blob.path).to_string());
                let snippet =
                    extract_snippet(&blob.data, query).unwrap_or_else(|| preview(&blob.data));
                SearchHit {
                    language: language_tag(&filename),
                    path: blob.path,
                    filename,
                    snippet,
                }
            })
            .collect())
    }
}

#[async_trait]
impl RepositoryProvider for GitLabClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::GitLab
    }

    async fn verify_credentials(&self) -> ProviderResult<()> {
        self.http.get_ok(self.http.url(["user"])).await
    }

    async fn list_repositories(&self) -> Vec<RepositorySummary> {
        or_empty(
            ProviderKind::GitLab,
            "list_repositories",
            self.fetch_projects().await,
        )
    }

    async fn get_repository_info(
        &self,
        repo: &RepositoryRef,
    ) -> ProviderResult<RepositorySummary> {
        let project = Self::project_segment(repo)?;
        let info: GitLabProject = self
            .http
            .get_json(self.http.url(["projects", project.as_str()]), &[])
            .await?;
        Ok(info.into())
    }

    async fn get_file_content(
        &self,
        repo: &RepositoryRef,
        path: &str,
        branch: Option<&str>,
    ) -> ProviderResult<FileContent> {
        let project = Self::project_segment(repo)?;
        let reference = repo.resolve_branch(branch, ProviderKind::GitLab);
        let path = path.trim_matches('/');

        let file: GitLabFile = self
            .http
            .get_json(
                self.http
                    .url(["projects", project.as_str(), "repository", "files", path]),
                &[("ref", reference)],
            )
            .await?;

        let bytes = decode_file_content(file.encoding.as_deref(), file.content)?;
        Ok(FileContent::from_bytes(
            path,
            bytes,
            file.blob_id,
            self.web_url(repo, "blob", reference, path),
        ))
    }

    async fn get_directory_contents(
        &self,
        repo: &RepositoryRef,
        path: &str,
        branch: Option<&str>,
    ) -> Vec<DirectoryEntry> {
        or_empty(
            ProviderKind::GitLab,
            "get_directory_contents",
            self.fetch_tree(repo, path, branch).await,
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
        let result = tokio::select! {
            _ = cancel.cancelled() => Err(ProviderError::Cancelled),
            result = self.blob_search(repo, query, branch) => result,
        };
        or_empty(ProviderKind::GitLab, "search_repository", result)
    }
}
