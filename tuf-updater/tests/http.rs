
/// Instead of guarding every individual thing with `#[cfg(feature = "http")]`, use a module.
#[cfg(feature = "http")]
mod http_happy {
    use crate::test_utils::RepoSim;
    use httptest::{matchers::*, responders::*, Expectation, Server};
    use std::path::Path;
    use std::str::FromStr;
    use std::time::Duration;
    use tuf_updater::{
        DefaultTransport, ErrorKind, HttpTransportBuilder, IntoVec, Transport,
        TransportErrorKind, UpdaterLoader,
    };
    use url::Url;

    /// Set an expectation in a test HTTP server which serves a file from `dir`.
    fn create_successful_get(dir: &Path, remote_dir: &str, file: &str) -> Expectation {
        let file_bytes = std::fs::read(dir.join(file)).unwrap();
        Expectation::matching(request::method_path(
            "GET",
            format!("/{remote_dir}/{file}"),
        ))
        .times(1)
        .respond_with(
            status_code(200)
                .append_header("content-type", "application/octet-stream")
                .body(file_bytes),
        )
    }

    /// Set an expectation in a test HTTP server to return a `403 Forbidden` status code, which is
    /// what S3 returns for a file that does not exist.
    fn create_unsuccessful_get(relative_path: &str) -> Expectation {
        Expectation::matching(request::method_path("GET", format!("/{relative_path}")))
            .times(1)
            .respond_with(status_code(403))
    }

    fn repo() -> RepoSim {
        let mut sim = RepoSim::new();
        sim.add_target("targets", "file1.txt", b"This is an example target file.");
        sim.publish();
        sim
    }

    fn loader(sim: &RepoSim, server: &Server) -> UpdaterLoader {
        UpdaterLoader::new(
            sim.client_metadata(),
            Url::from_str(server.url_str("/metadata").as_str()).unwrap(),
        )
        .target_dir(sim.client_targets())
        .target_base_url(Url::from_str(server.url_str("/targets").as_str()).unwrap())
    }

    async fn run_http_test<T: Transport + 'static>(transport: T) {
        let sim = repo();
        let metadata = sim.repo_metadata();
        let server = Server::run();
        server.expect(create_unsuccessful_get("metadata/2.root.json"));
        for file in ["timestamp.json", "snapshot.json", "targets.json"] {
            server.expect(create_successful_get(&metadata, "metadata", file));
        }
        server.expect(create_successful_get(
            &sim.repo_targets(),
            "targets",
            "file1.txt",
        ));

        let mut updater = loader(&sim, &server)
            .transport(transport)
            .load()
            .await
            .unwrap();
        updater.refresh().await.unwrap();
        let target = updater.get_target_info("file1.txt").await.unwrap().unwrap();
        let path = updater.download_target(&target, None, None).await.unwrap();
        assert_eq!(
            std::fs::read(path).unwrap(),
            b"This is an example target file."
        );
    }

    /// Test that `tuf-updater` works with a healthy HTTP server.
    #[tokio::test]
    async fn test_http_transport_happy_case() {
        run_http_test(HttpTransportBuilder::new().build()).await;
    }

    /// Test that `DefaultTransport` works over HTTP when the `http` feature is enabled.
    #[tokio::test]
    async fn test_http_default_transport() {
        run_http_test(DefaultTransport::default()).await;
    }

    /// A missing timestamp is reported with its status code.
    #[tokio::test]
    async fn test_http_error_status() {
        let sim = repo();
        let server = Server::run();
        server.expect(create_unsuccessful_get("metadata/2.root.json"));
        server.expect(
            Expectation::matching(request::method_path("GET", "/metadata/timestamp.json"))
                .times(1..)
                .respond_with(status_code(500)),
        );

        let transport = HttpTransportBuilder::new()
            .tries(1)
            .timeout(Duration::from_secs(5))
            .build();
        let mut updater = loader(&sim, &server)
            .transport(transport)
            .load()
            .await
            .unwrap();
        let err = updater.refresh().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DownloadHttp);
        assert!(err.kind().is_download());
    }

    /// A server error is retried, and the retried response is streamed.
    #[tokio::test]
    async fn test_http_retries_server_error() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/metadata/timestamp.json"))
                .times(2)
                .respond_with(httptest::cycle![
                    status_code(503),
                    status_code(200).body("timestamp bytes"),
                ]),
        );

        let transport = HttpTransportBuilder::new()
            .tries(2)
            .initial_backoff(Duration::from_millis(1))
            .build();
        let url = Url::from_str(server.url_str("/metadata/timestamp.json").as_str()).unwrap();
        let data = transport.fetch(url).await.unwrap().into_vec().await.unwrap();
        assert_eq!(data, b"timestamp bytes");
    }

    /// A missing file is not retried and keeps its status code.
    #[tokio::test]
    async fn test_http_not_found_is_not_retried() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/metadata/2.root.json"))
                .times(1)
                .respond_with(status_code(404)),
        );

        let transport = HttpTransportBuilder::new().tries(3).build();
        let url = Url::from_str(server.url_str("/metadata/2.root.json").as_str()).unwrap();
        let err = transport.fetch(url).await.err().unwrap();
        assert_eq!(err.kind(), TransportErrorKind::FileNotFound);
        assert_eq!(err.status(), Some(404));
    }
}
