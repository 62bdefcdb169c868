use crate::apis::http::{or_empty, path_segments, web_link, ClientOptions, HttpTransport};
use crate::apis::provider::RepositoryProvider;
use crate::errors::{ProviderError, ProviderResult};
use crate::models::{
    basename, owner_of, DirectoryEntry, EntryKind, FileContent, ProviderKind, RepoIdentifier,
    RepositoryRef, RepositorySummary, SearchHit,
};
use crate::search::fallback::{RecursiveSearch, SearchOptions};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Url;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

const WEB_BASE: &str = "https://bitbucket.org";

/// Listing pages followed per directory before giving up on a runaway cursor.
const MAX_SRC_PAGES: usize = 1000;

// Bitbucket Cloud 2.0 models
#[derive(Debug, Deserialize)]
struct BitbucketPage<T> {
    #[serde(default = "Vec::new")]
    values: Vec<T>,
    /// Absolute URL of the following page, absent on the last one
    #[serde(default)]
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BitbucketLink {
    href: String,
}

#[derive(Debug, Default, Deserialize)]
struct BitbucketLinks {
    #[serde(default)]
    html: Option<BitbucketLink>,
}

#[derive(Debug, Deserialize)]
struct BitbucketBranch {
    name: String,
}

#[derive(Debug, Deserialize)]
struct BitbucketRepo {
    uuid: String,
    name: String,
    full_name: String,
    #[serde(default)]
    links: BitbucketLinks,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    updated_on: Option<String>,
    #[serde(default)]
    mainbranch: Option<BitbucketBranch>,
    #[serde(default)]
    language: Option<String>,
}

impl From<BitbucketRepo> for RepositorySummary {
    fn from(repo: BitbucketRepo) -> Self {
        RepositorySummary {
            external_id: repo.uuid,
            owner: owner_of(&repo.full_name),
            url: repo
                .links
                .html
                .map(|link| link.href)
                .unwrap_or_else(|| format!("{}/{}", WEB_BASE, repo.full_name)),
            name: repo.name,
            full_name: repo.full_name,
            description: repo.description.unwrap_or_default(),
            updated_at: repo.updated_on.unwrap_or_default(),
            default_branch: repo.mainbranch.map(|branch| branch.name),
            primary_language: repo.language.filter(|lang| !lang.is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct BitbucketCommit {
    hash: String,
}

#[derive(Debug, Deserialize)]
struct BitbucketSrcEntry {
    path: String,
    #[serde(rename = "type")]
    entry_type: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    commit: Option<BitbucketCommit>,
}

pub struct BitbucketClient {
    http: HttpTransport,
    search_options: SearchOptions,
}

impl BitbucketClient {
    pub fn new(username: &str, app_password: &str) -> ProviderResult<Self> {
        Self::with_options(
            username,
            app_password,
            &ClientOptions::for_provider(ProviderKind::Bitbucket),
        )
    }

    pub fn with_options(
        username: &str,
        app_password: &str,
        options: &ClientOptions,
    ) -> ProviderResult<Self> {
        let encoded = STANDARD.encode(format!("{}:{}", username, app_password));
        let http = HttpTransport::new(
            ProviderKind::Bitbucket,
            options,
            format!("Basic {}", encoded),
        )?;
        Ok(Self {
            http,
            search_options: SearchOptions {
                concurrency: options.max_concurrent_requests.max(1),
                ..SearchOptions::default()
            },
        })
    }

    pub fn with_search_options(mut self, search_options: SearchOptions) -> Self {
        self.search_options = search_options;
        self
    }

    pub fn base_url(&self) -> &str {
        self.http.base_url()
    }

    fn workspace_and_slug(repo: &RepositoryRef) -> ProviderResult<(&str, &str)> {
        match &repo.id {
            RepoIdentifier::FullName { full_name } => full_name
                .split_once('/')
                .filter(|(workspace, slug)| {
                    !workspace.is_empty() && !slug.is_empty() && !slug.contains('/')
                })
                .ok_or_else(|| {
                    ProviderError::invalid_input(format!(
                        "Bitbucket repositories are addressed as workspace/slug, got {}",
                        full_name
                    ))
                }),
            RepoIdentifier::ProjectId { project_id } => Err(ProviderError::invalid_input(format!(
                "Bitbucket does not accept numeric project id {}",
                project_id
            ))),
        }
    }

    /// `/repositories/{workspace}/{slug}/src/{ref}/{path}`, with a trailing slash
    /// when listing a directory.
    fn src_url(
        &self,
        workspace: &str,
        slug: &str,
        reference: &str,
        path: &str,
        directory: bool,
    ) -> Url {
        let trailing = if directory { Some("") } else { None };
        self.http.url(
            ["repositories", workspace, slug, "src", reference]
                .into_iter()
                .chain(path_segments(path))
                .chain(trailing),
        )
    }

    /// Every entry of a directory, following `next` links across pages.
    async fn list_src(
        &self,
        workspace: &str,
        slug: &str,
        reference: &str,
        path: &str,
    ) -> ProviderResult<Vec<BitbucketSrcEntry>> {
        let mut page: BitbucketPage<BitbucketSrcEntry> = self
            .http
            .get_json(
                self.src_url(workspace, slug, reference, path, true),
                &[("pagelen", "100")],
            )
            .await?;
        let mut entries = std::mem::take(&mut page.values);

        for _ in 0..MAX_SRC_PAGES {
            let Some(next) = page.next.take() else {
                break;
            };
            let next = Url::parse(&next).map_err(|e| {
                ProviderError::malformed(format!("Invalid next page link {}: {}", next, e))
            })?;
            debug!(path, next = %next, "following src page");
            page = self.http.get_json(next, &[]).await?;
            entries.append(&mut page.values);
        }
        Ok(entries)
    }

    fn web_url(workspace: &str, slug: &str, reference: &str, path: &str) -> String {
        web_link(
            WEB_BASE,
            [workspace, slug, "src", reference]
                .into_iter()
                .chain(path_segments(path)),
        )
    }

    /// Commit hash for `path`, read from its parent directory listing.
    async fn lookup_hash(
        &self,
        workspace: &str,
        slug: &str,
        reference: &str,
        path: &str,
    ) -> Option<String> {
        let parent = path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
        match self.list_src(workspace, slug, reference, parent).await {
            Ok(entries) => entries
                .into_iter()
                .find(|entry| entry.path == path)
                .and_then(|entry| entry.commit)
                .map(|commit| commit.hash),
            Err(err) => {
                debug!(path, kind = err.kind(), "hash lookup failed");
                None
            }
        }
    }

    async fn fetch_repositories(&self) -> ProviderResult<Vec<RepositorySummary>> {
        let page: BitbucketPage<BitbucketRepo> = self
            .http
            .get_json(
                self.http.url(["repositories"]),
                &[("role", "member"), ("pagelen", "100")],
            )
            .await?;
        Ok(page.values.into_iter().map(RepositorySummary::from).collect())
    }

    async fn fetch_directory(
        &self,
        repo: &RepositoryRef,
        path: &str,
        branch: Option<&str>,
    ) -> ProviderResult<Vec<DirectoryEntry>> {
        let (workspace, slug) = Self::workspace_and_slug(repo)?;
        let reference = repo.resolve_branch(branch, ProviderKind::Bitbucket);
        let entries = self
            .list_src(workspace, slug, reference, path.trim_matches('/'))
            .await?;

        Ok(entries
            .into_iter()
            .map(|entry| DirectoryEntry {
                name: basename(&entry.path).to_string(),
                kind: match entry.entry_type.as_str() {
                    "commit_directory" => EntryKind::Directory,
                    _ => EntryKind::File,
                },
                size: entry.size,
                url: Self::web_url(workspace, slug, reference, &entry.path),
                path: entry.path,
            })
            .collect())
    }
}

#[async_trait]
impl RepositoryProvider for BitbucketClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Bitbucket
    }

    async fn verify_credentials(&self) -> ProviderResult<()> {
        self.http.get_ok(self.http.url(["user"])).await
    }

    async fn list_repositories(&self) -> Vec<RepositorySummary> {
        or_empty(
            ProviderKind::Bitbucket,
            "list_repositories",
            self.fetch_repositories().await,
        )
    }

    async fn get_repository_info(
        &self,
        repo: &RepositoryRef,
    ) -> ProviderResult<RepositorySummary> {
        let (workspace, slug) = Self::workspace_and_slug(repo)?;
        let info: BitbucketRepo = self
            .http
            .get_json(self.http.url(["repositories", workspace, slug]), &[])
            .await?;
        Ok(info.into())
    }

    async fn get_file_content(
        &self,
        repo: &RepositoryRef,
        path: &str,
        branch: Option<&str>,
    ) -> ProviderResult<FileContent> {
        let (workspace, slug) = Self::workspace_and_slug(repo)?;
        let reference = repo.resolve_branch(branch, ProviderKind::Bitbucket);
        let path = path.trim_matches('/');

        let (_, bytes) = self
            .http
            .get_raw(
                self.src_url(workspace, slug, reference, path, false),
                &[],
                None,
            )
            .await?;

        // Missing hash is acceptable; the content is what callers need
        let content_hash = self.lookup_hash(workspace, slug, reference, path).await;

        Ok(FileContent::from_bytes(
            path,
            bytes,
            content_hash,
            Self::web_url(workspace, slug, reference, path),
        ))
    }

    async fn get_directory_contents(
        &self,
        repo: &RepositoryRef,
        path: &str,
        branch: Option<&str>,
    ) -> Vec<DirectoryEntry> {
        or_empty(
            ProviderKind::Bitbucket,
            "get_directory_contents",
            self.fetch_directory(repo, path, branch).await,
        )
    }

    /// Bitbucket Cloud has no code search API, so this walks the tree.
    async fn search_repository_cancellable(
        &self,
        repo: &RepositoryRef,
        query: &str,
        branch: Option<&str>,
        cancel: &CancellationToken,
    ) -> Vec<SearchHit> {
        if let Err(err) = Self::workspace_and_slug(repo) {
            return or_empty(ProviderKind::Bitbucket, "search_repository", Err(err));
        }
        RecursiveSearch::new(self, self.search_options.clone())
            .run(repo, query, branch, cancel)
            .await
    }
}
