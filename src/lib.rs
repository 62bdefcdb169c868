pub mod apis;
pub mod communication;
pub mod config;
pub mod context;
pub mod errors;
pub mod gateway;
pub mod language;
pub mod models;
pub mod search;

pub use apis::provider::{ProviderClient, RepositoryProvider};
pub use config::Config;
pub use errors::{ProviderError, ProviderResult};
pub use models::{
    ContentEncoding, Credential, DirectoryEntry, EntryKind, FileContent, ProviderKind,
    RepoIdentifier, RepositoryRef, RepositorySummary, SearchHit,
};
