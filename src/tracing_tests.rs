#[cfg(test)]
mod tests {
    use crate::config::ServerConfig;
    use crate::handlers::{handle_request, ServeContext};
    use crate::metrics::ServerMetrics;
    use crate::server::RepoServer;
    use crate::tracing_util::{elapsed_ms, generate_request_id};
    use smol::future::zip;
    use smol::io::{AsyncReadExt, AsyncWriteExt};
    use smol::net::{TcpListener, TcpStream};
    use std::sync::Arc;
    use std::time::Instant;

    #[test]
    fn test_request_id_generation_is_unique() {
        let id1 = generate_request_id();
        let id2 = generate_request_id();

        assert_ne!(id1, id2, "Request IDs should be unique");
        assert_eq!(id1.len(), 36, "Request ID should be UUID format");
    }

    #[test]
    fn test_latency_measurement() {
        let start = Instant::now();
        std::thread::sleep(std::time::Duration::from_millis(10));
        let latency = elapsed_ms(start);

        assert!(latency >= 10.0, "Latency should be at least 10ms");
    }

    #[test]
    #[tracing_test::traced_test]
    fn test_request_span_records_route_and_status() {
        let dir = tempfile::tempdir().expect("failed to create root dir");
        let ctx = Arc::new(ServeContext {
            root: dir.path().to_path_buf(),
            config: ServerConfig::default(),
            metrics: Arc::new(ServerMetrics::new().expect("metrics")),
        });

        let response = smol::block_on(async {
            let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
            let mut client = TcpStream::connect(listener.local_addr().unwrap()).await.unwrap();
            let (stream, addr) = listener.accept().await.unwrap();

            let client_side = async {
                client
                    .write_all(b"GET /repo/missing.deb HTTP/1.1\r\nHost: localhost\r\n\r\n")
                    .await
                    .unwrap();
                let mut response = String::new();
                client.read_to_string(&mut response).await.unwrap();
                response
            };
            let (_, response) = zip(handle_request(stream, addr, ctx), client_side).await;
            response
        });

        assert!(response.starts_with("HTTP/1.1 404 "), "{}", response);
        logs_assert(|lines: &[&str]| {
            let completed: Vec<_> = lines
                .iter()
                .filter(|line| line.contains("Request completed"))
                .collect();
            match completed.as_slice() {
                [line] if line.contains("http_request")
                    && line.contains("/repo/missing.deb")
                    && line.contains("GET")
                    && line.contains("status_code=404") =>
                {
                    Ok(())
                }
                _ => Err(format!("unexpected request logs: {:?}", completed)),
            }
        });
    }

    #[test]
    #[tracing_test::traced_test]
    fn test_lifecycle_is_logged() {
        let dir = tempfile::tempdir().expect("failed to create root dir");
        let mut server = RepoServer::start(dir.path()).expect("server should start");
        let port = server.port();

        assert!(logs_contain("Repo server listening"));
        assert!(logs_contain(&format!("port={}", port)));

        server.stop().expect("server should stop");
        assert!(logs_contain("Repo server stopped"));
    }
}
