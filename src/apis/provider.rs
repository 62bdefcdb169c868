use crate::apis::bitbucket::BitbucketClient;
use crate::apis::github::GitHubClient;
use crate::apis::gitlab::GitLabClient;
use crate::apis::http::ClientOptions;
use crate::errors::{ProviderError, ProviderResult};
use crate::models::{
    Credential, DirectoryEntry, FileContent, ProviderKind, RepositoryRef, RepositorySummary,
    SearchHit,
};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Uniform access to a hosted Git provider.
///
/// Listing operations return an empty collection on failure; single-entity
/// operations report why they failed.
#[async_trait]
pub trait RepositoryProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Identity check against the provider with the held credential.
    async fn verify_credentials(&self) -> ProviderResult<()>;

    async fn test_connection(&self) -> bool {
        self.verify_credentials().await.is_ok()
    }

    /// First page of repositories visible to the credential.
    async fn list_repositories(&self) -> Vec<RepositorySummary>;

    async fn get_repository_info(&self, repo: &RepositoryRef)
        -> ProviderResult<RepositorySummary>;

    async fn get_file_content(
        &self,
        repo: &RepositoryRef,
        path: &str,
        branch: Option<&str>,
    ) -> ProviderResult<FileContent>;

    /// Immediate children of `path`; the root is `""`.
    async fn get_directory_contents(
        &self,
        repo: &RepositoryRef,
        path: &str,
        branch: Option<&str>,
    ) -> Vec<DirectoryEntry>;

    async fn search_repository_cancellable(
        &self,
        repo: &RepositoryRef,
        query: &str,
        branch: Option<&str>,
        cancel: &CancellationToken,
    ) -> Vec<SearchHit>;

    async fn search_repository(
        &self,
        repo: &RepositoryRef,
        query: &str,
        branch: Option<&str>,
    ) -> Vec<SearchHit> {
        self.search_repository_cancellable(repo, query, branch, &CancellationToken::new())
            .await
    }
}

/// Provider clients behind one type, dispatched by variant.
#[derive(Clone)]
pub enum ProviderClient {
    GitHub(Arc<GitHubClient>),
    GitLab(Arc<GitLabClient>),
    Bitbucket(Arc<BitbucketClient>),
}

impl ProviderClient {
    /// Build the client for `kind`, checking that the credential shape fits it.
    pub fn new(
        kind: ProviderKind,
        credential: &Credential,
        options: &ClientOptions,
    ) -> ProviderResult<Self> {
        match (kind, credential) {
            (ProviderKind::GitHub, Credential::Token { token }) => Ok(Self::GitHub(Arc::new(
                GitHubClient::with_options(token, options)?,
            ))),
            (ProviderKind::GitLab, Credential::Token { token }) => Ok(Self::GitLab(Arc::new(
                GitLabClient::with_options(token, options)?,
            ))),
            (
                ProviderKind::Bitbucket,
                Credential::Basic {
                    username,
                    app_password,
                },
            ) => Ok(Self::Bitbucket(Arc::new(BitbucketClient::with_options(
                username,
                app_password,
                options,
            )?))),
            (kind, credential) => Err(ProviderError::invalid_input(format!(
                "{:?} cannot be used with {}",
                credential, kind
            ))),
        }
    }

    pub fn as_provider(&self) -> &dyn RepositoryProvider {
        match self {
            Self::GitHub(client) => client.as_ref(),
            Self::GitLab(client) => client.as_ref(),
            Self::Bitbucket(client) => client.as_ref(),
        }
    }
}

#[async_trait]
impl RepositoryProvider for ProviderClient {
    fn kind(&self) -> ProviderKind {
        self.as_provider().kind()
    }

    async fn verify_credentials(&self) -> ProviderResult<()> {
        self.as_provider().verify_credentials().await
    }

    async fn list_repositories(&self) -> Vec<RepositorySummary> {
        self.as_provider().list_repositories().await
    }

    async fn get_repository_info(
        &self,
        repo: &RepositoryRef,
    ) -> ProviderResult<RepositorySummary> {
        self.as_provider().get_repository_info(repo).await
    }

    async fn get_file_content(
        &self,
        repo: &RepositoryRef,
        path: &str,
        branch: Option<&str>,
    ) -> ProviderResult<FileContent> {
        self.as_provider().get_file_content(repo, path, branch).await
    }

    async fn get_directory_contents(
        &self,
        repo: &RepositoryRef,
        path: &str,
        branch: Option<&str>,
    ) -> Vec<DirectoryEntry> {
        self.as_provider()
            .get_directory_contents(repo, path, branch)
            .await
    }

    async fn search_repository_cancellable(
        &self,
        repo: &RepositoryRef,
        query: &str,
        branch: Option<&str>,
        cancel: &CancellationToken,
    ) -> Vec<SearchHit> {
        self.as_provider()
            .search_repository_cancellable(repo, query, branch, cancel)
            .await
    }
}
