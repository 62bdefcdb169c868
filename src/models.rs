use crate::language::language_tag;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Secret material handed to a provider client.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Credential {
    /// Personal access token (GitHub, GitLab)
    Token { token: String },
    /// Username plus app password (Bitbucket)
    Basic {
        username: String,
        app_password: String,
    },
}

impl Credential {
    pub fn token(token: impl Into<String>) -> Self {
        Self::Token {
            token: token.into(),
        }
    }

    pub fn basic(username: impl Into<String>, app_password: impl Into<String>) -> Self {
        Self::Basic {
            username: username.into(),
            app_password: app_password.into(),
        }
    }
}

// Secrets never end up in logs
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Token { .. } => f.write_str("Credential::Token(****)"),
            Credential::Basic { username, .. } => {
                write!(f, "Credential::Basic({}:****)", username)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    GitHub,
    GitLab,
    Bitbucket,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 3] = [
        ProviderKind::GitHub,
        ProviderKind::GitLab,
        ProviderKind::Bitbucket,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::GitHub => "github",
            ProviderKind::GitLab => "gitlab",
            ProviderKind::Bitbucket => "bitbucket",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::GitHub => "https://api.github.com",
            ProviderKind::GitLab => "https://gitlab.com/api/v4",
            ProviderKind::Bitbucket => "https://api.bitbucket.org/2.0",
        }
    }

    /// Ref used when neither the caller nor the repository names one.
    pub fn default_ref(&self) -> &'static str {
        match self {
            ProviderKind::GitHub | ProviderKind::GitLab => "main",
            ProviderKind::Bitbucket => "master",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "github" => Ok(ProviderKind::GitHub),
            "gitlab" => Ok(ProviderKind::GitLab),
            "bitbucket" => Ok(ProviderKind::Bitbucket),
            other => Err(format!("Unknown provider: {}", other)),
        }
    }
}

/// How a repository is addressed. The two forms are never converted into each other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RepoIdentifier {
    FullName { full_name: String },
    ProjectId { project_id: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryRef {
    #[serde(flatten)]
    pub id: RepoIdentifier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_branch: Option<String>,
}

impl RepositoryRef {
    pub fn full_name(full_name: impl Into<String>) -> Self {
        Self {
            id: RepoIdentifier::FullName {
                full_name: full_name.into(),
            },
            default_branch: None,
        }
    }

    pub fn project_id(project_id: u64) -> Self {
        Self {
            id: RepoIdentifier::ProjectId { project_id },
            default_branch: None,
        }
    }

    pub fn with_default_branch(mut self, branch: impl Into<String>) -> Self {
        self.default_branch = Some(branch.into());
        self
    }

    /// Pick the ref for a call: explicit branch, then the repository default,
    /// then the provider default.
    pub fn resolve_branch<'a>(&'a self, branch: Option<&'a str>, kind: ProviderKind) -> &'a str {
        branch
            .filter(|b| !b.trim().is_empty())
            .or(self.default_branch.as_deref().filter(|b| !b.is_empty()))
            .unwrap_or_else(|| kind.default_ref())
    }
}

impl fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            RepoIdentifier::FullName { full_name } => f.write_str(full_name),
            RepoIdentifier::ProjectId { project_id } => write!(f, "project #{}", project_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositorySummary {
    pub external_id: String,
    pub name: String,
    /// Always `owner/name` shaped
    pub full_name: String,
    pub owner: String,
    pub url: String,
    pub description: String,
    pub updated_at: String,
    pub default_branch: Option<String>,
    pub primary_language: Option<String>,
}

/// Owner part of an `owner/name` path. Nested GitLab groups keep every parent segment.
pub fn owner_of(full_name: &str) -> String {
    full_name
        .rsplit_once('/')
        .map(|(owner, _)| owner.to_string())
        .unwrap_or_default()
}

/// How [`FileContent::content`] carries the file bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentEncoding {
    #[default]
    Utf8,
    /// Not valid UTF-8; `content` holds the bytes base64-encoded
    Base64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileContent {
    pub content: String,
    /// Byte length of the file, whatever the encoding of `content`
    pub size: usize,
    pub name: String,
    pub path: String,
    pub content_hash: Option<String>,
    pub url: String,
    pub language: String,
    #[serde(default)]
    pub encoding: ContentEncoding,
}

impl FileContent {
    /// Build from the fetched bytes. UTF-8 files are kept as text, anything else
    /// is carried base64-encoded and flagged as such.
    pub fn from_bytes(
        path: &str,
        bytes: Vec<u8>,
        content_hash: Option<String>,
        url: String,
    ) -> Self {
        let size = bytes.len();
        let (content, encoding) = match String::from_utf8(bytes) {
            Ok(text) => (text, ContentEncoding::Utf8),
            Err(err) => (STANDARD.encode(err.as_bytes()), ContentEncoding::Base64),
        };
        let name = basename(path).to_string();
        Self {
            content,
            size,
            language: language_tag(&name),
            name,
            path: path.to_string(),
            content_hash,
            url,
            encoding,
        }
    }

    pub fn is_text(&self) -> bool {
        self.encoding == ContentEncoding::Utf8
    }

    /// The file bytes exactly as stored by the provider.
    pub fn bytes(&self) -> Result<Vec<u8>, base64::DecodeError> {
        match self.encoding {
            ContentEncoding::Utf8 => Ok(self.content.as_bytes().to_vec()),
            ContentEncoding::Base64 => STANDARD.decode(&self.content),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub name: String,
    pub path: String,
    pub kind: EntryKind,
    pub size: u64,
    pub url: String,
}

impl DirectoryEntry {
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub path: String,
    pub filename: String,
    pub language: String,
    pub snippet: String,
}

/// Last path segment, used as the display name of files and directories.
pub fn basename(path: &str) -> &str {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(path)
}
