//! Tests for building provider clients from a kind and a credential

use super::mock_options;
use mockito::{Matcher, Server};
use repochat::apis::ClientOptions;
use repochat::{Credential, ProviderClient, ProviderKind, RepositoryProvider, RepositoryRef};

#[test]
fn test_factory_matches_credential_shape() {
    let token = Credential::token("t0ken");
    let basic = Credential::basic("alice", "secret");

    for (kind, credential) in [
        (ProviderKind::GitHub, &token),
        (ProviderKind::GitLab, &token),
        (ProviderKind::Bitbucket, &basic),
    ] {
        let client = ProviderClient::new(kind, credential, &ClientOptions::for_provider(kind))
            .unwrap_or_else(|e| panic!("{} client should build: {}", kind, e));
        assert_eq!(client.kind(), kind);
    }
}

#[test]
fn test_factory_rejects_mismatched_credential() {
    let options = ClientOptions::for_provider(ProviderKind::GitHub);

    let err = ProviderClient::new(
        ProviderKind::GitHub,
        &Credential::basic("alice", "secret"),
        &options,
    )
    .err()
    .expect("basic auth is not valid for GitHub");
    assert_eq!(err.kind(), "invalid_input");
    // The rendered error must not leak the secret
    assert!(!err.to_string().contains("secret"));

    let err = ProviderClient::new(
        ProviderKind::Bitbucket,
        &Credential::token("t0ken"),
        &ClientOptions::for_provider(ProviderKind::Bitbucket),
    )
    .err()
    .expect("a bare token is not valid for Bitbucket");
    assert_eq!(err.kind(), "invalid_input");
}

#[test]
fn test_factory_rejects_bad_base_url() {
    let options = ClientOptions::for_provider(ProviderKind::GitLab).with_base_url("not a url");
    let err = ProviderClient::new(ProviderKind::GitLab, &Credential::token("t"), &options)
        .err()
        .expect("invalid base url");
    assert_eq!(err.kind(), "invalid_input");
}

#[tokio::test]
async fn test_dispatch_reaches_selected_provider() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/projects/42/repository/tree")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"[{"name": "README.md", "path": "README.md", "type": "blob"}]"#)
        .create_async()
        .await;

    let client = ProviderClient::new(
        ProviderKind::GitLab,
        &Credential::token("glpat"),
        &mock_options(ProviderKind::GitLab, &server),
    )
    .unwrap();

    let entries = client
        .get_directory_contents(&RepositoryRef::project_id(42), "", None)
        .await;
    mock.assert_async().await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "README.md");
}
