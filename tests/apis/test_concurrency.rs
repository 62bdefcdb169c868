//! Many requests through one client at the same time

use super::mock_options;
use futures::future::join_all;
use mockito::{Matcher, Server};
use repochat::apis::GitHubClient;
use repochat::{ProviderKind, RepositoryProvider, RepositoryRef};
use std::sync::Arc;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_simultaneous_file_fetches_get_their_own_content() {
    let mut server = Server::new_async().await;
    let mut mocks = Vec::new();
    for i in 0..20 {
        let mock = server
            .mock("GET", format!("/repos/acme/widgets/contents/file_{}.rs", i).as_str())
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(format!("// file number {}\n", i))
            .create_async()
            .await;
        mocks.push(mock);
    }

    // Fewer permits than requests, so some calls wait for a slot
    let options = mock_options(ProviderKind::GitHub, &server).with_max_concurrent_requests(3);
    let client = Arc::new(GitHubClient::with_options("ghp_test", &options).unwrap());
    let repo = RepositoryRef::full_name("acme/widgets");

    let results = join_all((0..20).map(|i| {
        let client = Arc::clone(&client);
        let repo = repo.clone();
        tokio::spawn(async move {
            client
                .get_file_content(&repo, &format!("file_{}.rs", i), None)
                .await
        })
    }))
    .await;

    for (i, result) in results.into_iter().enumerate() {
        let file = result
            .expect("task should not panic")
            .expect("fetch should succeed");
        assert_eq!(file.path, format!("file_{}.rs", i));
        assert_eq!(file.content, format!("// file number {}\n", i));
        assert_eq!(file.language, "rust");
    }

    for mock in mocks {
        mock.assert_async().await;
    }
}
