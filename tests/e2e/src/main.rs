fn main() {
    println!("Run `cargo test -p chunkferry-e2e` to execute the end-to-end tests.");
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;

    use tempfile::TempDir;

    use chunkferry_client::{FileUploader, ServerConnection, WsConnection};
    use chunkferry_protocol::messages::{ChunkSetResponse, MergeResponse};
    use chunkferry_protocol::MessageType;
    use chunkferry_server::{ServerConfig, UploadHandler, UploadServer};
    use chunkferry_transfer::{chunk_spans, fingerprint_file, read_chunk};

    struct TestServer {
        server: Arc<UploadServer<UploadHandler>>,
        root: PathBuf,
        _dir: TempDir,
        url: String,
    }

    /// Starts a real server on an ephemeral port over a temp storage root.
    async fn start_server() -> TestServer {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("uploads");
        let handler = UploadHandler::new(&root).await.unwrap();
        let server = UploadServer::new(ServerConfig { port: 0 }, handler);

        let runner = Arc::clone(&server);
        tokio::spawn(async move {
            runner.run().await.unwrap();
        });

        for _ in 0..100 {
            if server.port().await != 0 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        let port = server.port().await;
        assert!(port > 0, "server did not bind");

        TestServer {
            server,
            root,
            _dir: dir,
            url: format!("ws://127.0.0.1:{port}"),
        }
    }

    async fn probe(conn: &WsConnection, fingerprint: &str) -> Vec<u32> {
        let resp = conn
            .send_request(
                MessageType::CheckChunks,
                &serde_json::json!({ "fingerprint": fingerprint }),
            )
            .await
            .unwrap();
        let set: ChunkSetResponse = resp.parse_payload().unwrap().unwrap();
        let mut indices = set.indices;
        indices.sort_unstable();
        indices
    }

    async fn put_chunk(conn: &WsConnection, path: &std::path::Path, fingerprint: &str, index: u32) {
        let span = chunk_spans(std::fs::metadata(path).unwrap().len(), 10)
            .unwrap()
            .nth(index as usize)
            .unwrap();
        let chunk = read_chunk(path, span).unwrap();
        let header = serde_json::json!({
            "fingerprint": fingerprint,
            "index": chunk.index,
            "checksum": chunk.checksum,
        });
        let resp = conn.send_chunk(&header, &chunk.data).await.unwrap();
        assert_eq!(resp.msg_type, MessageType::ChunkReceived);
    }

    async fn merge(
        conn: &WsConnection,
        fingerprint: &str,
        total: u32,
        name: &str,
    ) -> MergeResponse {
        let resp = conn
            .send_request(
                MessageType::MergeUpload,
                &serde_json::json!({
                    "fingerprint": fingerprint,
                    "total": total,
                    "name": name,
                }),
            )
            .await
            .expect("merge request failed");
        resp.parse_payload().unwrap().unwrap()
    }

    #[tokio::test]
    async fn chunk_protocol_scenario_out_of_order() {
        let ts = start_server().await;
        let conn = WsConnection::connect(&ts.url).await.unwrap();

        // 25-byte source, chunk size 10 => chunks of 10, 10, 5 bytes.
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("source.bin");
        std::fs::write(&source, b"ABCDEFGHIJKLMNOPQRSTUVWXY").unwrap();
        let fingerprint = fingerprint_file(&source, 10).unwrap();

        // Nothing stored yet.
        assert!(probe(&conn, &fingerprint).await.is_empty());

        // Upload out of order: 2 first, then 0, then 1; probe in between.
        put_chunk(&conn, &source, &fingerprint, 2).await;
        put_chunk(&conn, &source, &fingerprint, 0).await;
        assert_eq!(probe(&conn, &fingerprint).await, vec![0, 2]);
        put_chunk(&conn, &source, &fingerprint, 1).await;
        assert_eq!(probe(&conn, &fingerprint).await, vec![0, 1, 2]);

        // Merge and verify the artifact byte-for-byte.
        let merged = merge(&conn, &fingerprint, 3, "f.bin").await;
        let artifact = std::fs::read(&merged.path).unwrap();
        assert_eq!(artifact, std::fs::read(&source).unwrap());
        assert_eq!(artifact.len(), 25);

        // Chunk directory is gone.
        assert!(!ts.root.join(&fingerprint).exists());

        conn.close().await;
        ts.server.shutdown();
    }

    #[tokio::test]
    async fn duplicate_chunk_put_reports_already_present() {
        let ts = start_server().await;
        let conn = WsConnection::connect(&ts.url).await.unwrap();

        let dir = TempDir::new().unwrap();
        let source = dir.path().join("source.bin");
        std::fs::write(&source, b"0123456789AB").unwrap();
        let fingerprint = fingerprint_file(&source, 10).unwrap();

        let span = chunk_spans(12, 10).unwrap().next().unwrap();
        let chunk = read_chunk(&source, span).unwrap();
        let header = serde_json::json!({
            "fingerprint": fingerprint,
            "index": 0,
            "checksum": chunk.checksum,
        });

        let first = conn.send_chunk(&header, &chunk.data).await.unwrap();
        let first: chunkferry_protocol::messages::ChunkReceivedResponse =
            first.parse_payload().unwrap().unwrap();
        assert!(!first.already_present);

        let second = conn.send_chunk(&header, &chunk.data).await.unwrap();
        let second: chunkferry_protocol::messages::ChunkReceivedResponse =
            second.parse_payload().unwrap().unwrap();
        assert!(second.already_present);

        // Still exactly one stored index.
        assert_eq!(probe(&conn, &fingerprint).await, vec![0]);

        conn.close().await;
        ts.server.shutdown();
    }

    #[tokio::test]
    async fn merge_count_mismatch_reports_reason() {
        let ts = start_server().await;
        let conn = WsConnection::connect(&ts.url).await.unwrap();

        let dir = TempDir::new().unwrap();
        let source = dir.path().join("source.bin");
        std::fs::write(&source, b"ABCDEFGHIJKLMNOPQRSTUVWXY").unwrap();
        let fingerprint = fingerprint_file(&source, 10).unwrap();

        put_chunk(&conn, &source, &fingerprint, 0).await;

        let err = conn
            .send_request(
                MessageType::MergeUpload,
                &serde_json::json!({
                    "fingerprint": fingerprint,
                    "total": 3,
                    "name": "f.bin",
                }),
            )
            .await
            .unwrap_err();
        let text = err.to_string();
        assert!(text.contains("mismatch"), "unexpected error: {text}");

        // The stored chunk survives for a later resume.
        assert_eq!(probe(&conn, &fingerprint).await, vec![0]);

        conn.close().await;
        ts.server.shutdown();
    }

    #[tokio::test]
    async fn merge_without_chunks_reports_nothing_to_merge() {
        let ts = start_server().await;
        let conn = WsConnection::connect(&ts.url).await.unwrap();

        let err = conn
            .send_request(
                MessageType::MergeUpload,
                &serde_json::json!({
                    "fingerprint": "feedfacefeedfacefeedfacefeedface",
                    "total": 1,
                    "name": "ghost.bin",
                }),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("nothing to merge"));

        conn.close().await;
        ts.server.shutdown();
    }

    #[tokio::test]
    async fn concurrent_duplicate_merges_agree() {
        let ts = start_server().await;
        let conn1 = WsConnection::connect(&ts.url).await.unwrap();
        let conn2 = WsConnection::connect(&ts.url).await.unwrap();

        let dir = TempDir::new().unwrap();
        let source = dir.path().join("source.bin");
        std::fs::write(&source, b"ABCDEFGHIJKLMNOPQRST").unwrap();
        let fingerprint = fingerprint_file(&source, 10).unwrap();

        put_chunk(&conn1, &source, &fingerprint, 0).await;
        put_chunk(&conn1, &source, &fingerprint, 1).await;

        let (a, b) = tokio::join!(
            merge(&conn1, &fingerprint, 2, "dup.bin"),
            merge(&conn2, &fingerprint, 2, "dup.bin"),
        );
        assert_eq!(a.path, b.path);
        assert_eq!(std::fs::read(&a.path).unwrap(), b"ABCDEFGHIJKLMNOPQRST");
        assert!(!ts.root.join(&fingerprint).exists());

        conn1.close().await;
        conn2.close().await;
        ts.server.shutdown();
    }

    #[tokio::test]
    async fn uploader_end_to_end() {
        let ts = start_server().await;
        let conn = Arc::new(WsConnection::connect(&ts.url).await.unwrap());
        let uploader = FileUploader::new(conn);

        let dir = TempDir::new().unwrap();
        let source = dir.path().join("big.bin");
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(&source, &data).unwrap();

        let (events_tx, _events_rx) = tokio::sync::mpsc::channel(256);
        let path = uploader
            .upload(&source, "big.bin", 1024, &events_tx)
            .await
            .unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), data);
        ts.server.shutdown();
    }

    #[tokio::test]
    async fn uploader_resumes_partial_upload() {
        let ts = start_server().await;
        let conn = WsConnection::connect(&ts.url).await.unwrap();

        let dir = TempDir::new().unwrap();
        let source = dir.path().join("partial.bin");
        std::fs::write(&source, &[9u8; 35]).unwrap(); // 4 chunks at size 10
        let fingerprint = fingerprint_file(&source, 10).unwrap();

        // A previous attempt left chunks 0, 2, 3 behind.
        for index in [0, 2, 3] {
            put_chunk(&conn, &source, &fingerprint, index).await;
        }
        assert_eq!(probe(&conn, &fingerprint).await, vec![0, 2, 3]);

        let uploader = FileUploader::new(Arc::new(conn));
        let (events_tx, _events_rx) = tokio::sync::mpsc::channel(256);
        let path = uploader
            .upload(&source, "partial.bin", 10, &events_tx)
            .await
            .unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), vec![9u8; 35]);
        assert!(!ts.root.join(&fingerprint).exists());
        ts.server.shutdown();
    }

    #[tokio::test]
    async fn whole_file_upload_roundtrip() {
        let ts = start_server().await;
        let conn = Arc::new(WsConnection::connect(&ts.url).await.unwrap());
        let uploader = FileUploader::new(conn);

        let dir = TempDir::new().unwrap();
        let source = dir.path().join("tiny.txt");
        std::fs::write(&source, b"small enough for one request").unwrap();

        let path = uploader.upload_whole(&source, "tiny.txt").await.unwrap();
        assert_eq!(
            std::fs::read(&path).unwrap(),
            b"small enough for one request"
        );
        ts.server.shutdown();
    }

    #[tokio::test]
    async fn repeated_upload_short_circuits_to_existing_artifact() {
        let ts = start_server().await;

        let dir = TempDir::new().unwrap();
        let source = dir.path().join("again.bin");
        std::fs::write(&source, &[5u8; 25]).unwrap();

        let conn = Arc::new(WsConnection::connect(&ts.url).await.unwrap());
        let uploader = FileUploader::new(Arc::clone(&conn) as Arc<dyn ServerConnection>);
        let (events_tx, _events_rx) = tokio::sync::mpsc::channel(256);

        let first = uploader
            .upload(&source, "again.bin", 10, &events_tx)
            .await
            .unwrap();
        // Second upload of the same file and name completes against the
        // existing artifact.
        let second = uploader
            .upload(&source, "again.bin", 10, &events_tx)
            .await
            .unwrap();
        assert_eq!(first, second);

        ts.server.shutdown();
    }
}
