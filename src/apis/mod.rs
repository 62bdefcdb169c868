pub mod bitbucket;
pub mod github;
pub mod gitlab;
pub mod http;
pub mod provider;

pub use bitbucket::BitbucketClient;
pub use github::GitHubClient;
pub use gitlab::GitLabClient;
pub use http::ClientOptions;
pub use provider::{ProviderClient, RepositoryProvider};
