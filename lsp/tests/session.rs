//! Session handshake and end-to-end formatting over in-memory pipes.

use serde_json::{Value, json};
use tokio::io::{self, DuplexStream, ReadHalf, WriteHalf};

use xmlfmt_lsp::codec::{MessageReader, MessageWriter};
use xmlfmt_lsp::endpoint::RpcEndpoint;
use xmlfmt_lsp::{LspSession, format_file};

struct ScriptedServer {
    reader: MessageReader<ReadHalf<DuplexStream>>,
    writer: MessageWriter<WriteHalf<DuplexStream>>,
}

impl ScriptedServer {
    async fn recv(&mut self) -> Value {
        self.reader
            .recv()
            .await
            .expect("reading client frame")
            .expect("client closed the stream")
    }

    async fn send(&mut self, frame: Value) {
        self.writer.send(&frame).await.expect("writing server frame");
    }

    async fn respond(&mut self, id: &Value, result: Value) {
        self.send(json!({"jsonrpc": "2.0", "id": id, "result": result}))
            .await;
    }

    /// Play the server side of a successful handshake.
    async fn accept_handshake(&mut self) -> Value {
        let initialize = self.recv().await;
        assert_eq!(initialize["method"], "initialize");
        self.respond(&initialize["id"], json!({"capabilities": {}}))
            .await;

        let initialized = self.recv().await;
        assert_eq!(initialized["method"], "initialized");
        assert!(initialized.get("id").is_none());

        initialize
    }
}

fn connected() -> (RpcEndpoint, ScriptedServer) {
    let (client_io, server_io) = io::duplex(64 * 1024);
    let (client_read, client_write) = io::split(client_io);
    let (server_read, server_write) = io::split(server_io);

    let endpoint = RpcEndpoint::new(client_read, client_write, LspSession::handlers());
    let server = ScriptedServer {
        reader: MessageReader::new(server_read),
        writer: MessageWriter::new(server_write),
    };
    (endpoint, server)
}

#[tokio::test]
async fn handshake_sends_initialize_then_initialized() {
    let (endpoint, mut server) = connected();

    let server_task = tokio::spawn(async move {
        let initialize = server.accept_handshake().await;
        (initialize, server)
    });

    let options = json!({"settings": {"xml": {"format": {"tabSize": 2}}}});
    let _session = LspSession::connect(endpoint, &options).await.unwrap();

    let (initialize, _server) = server_task.await.unwrap();
    let params = &initialize["params"];
    assert!(params["processId"].is_number());
    assert_eq!(params["rootUri"], "file:///");
    assert_eq!(params["capabilities"], json!({}));
    assert_eq!(
        params["initializationOptions"]["settings"]["xml"]["format"]["tabSize"],
        2
    );
}

#[tokio::test]
async fn handshake_error_response_fails_session_construction() {
    let (endpoint, mut server) = connected();

    let server_task = tokio::spawn(async move {
        let initialize = server.recv().await;
        server
            .send(json!({
                "jsonrpc": "2.0",
                "id": initialize["id"],
                "error": {"code": -32002, "message": "server not ready"}
            }))
            .await;
        server
    });

    let result = LspSession::connect(endpoint, &json!({})).await;
    let err = result.err().expect("handshake must fail");
    let rendered = format!("{err:#}");
    assert!(rendered.contains("initialize"), "got: {rendered}");

    drop(server_task.await.unwrap());
}

#[tokio::test]
async fn format_request_returns_typed_edits() {
    let (endpoint, mut server) = connected();

    let server_task = tokio::spawn(async move {
        server.accept_handshake().await;

        let did_open = server.recv().await;
        assert_eq!(did_open["method"], "textDocument/didOpen");
        assert_eq!(did_open["params"]["textDocument"]["languageId"], "xml");
        assert_eq!(did_open["params"]["textDocument"]["version"], 1);
        assert_eq!(did_open["params"]["textDocument"]["text"], "<a><b/></a>\n");

        let formatting = server.recv().await;
        assert_eq!(formatting["method"], "textDocument/formatting");
        assert_eq!(formatting["params"]["options"]["tabSize"], 2);
        server
            .respond(
                &formatting["id"],
                json!([{
                    "range": {
                        "start": {"line": 0, "character": 3},
                        "end": {"line": 0, "character": 3}
                    },
                    "newText": "\n  "
                }]),
            )
            .await;
        server
    });

    let session = LspSession::connect(endpoint, &json!({})).await.unwrap();
    session
        .did_open("file:///work/a.xml", "<a><b/></a>\n")
        .await
        .unwrap();
    let edits = session
        .format("file:///work/a.xml", &json!({"tabSize": 2}))
        .await
        .unwrap();

    assert_eq!(edits.len(), 1);
    assert_eq!(edits[0].new_text, "\n  ");
    assert_eq!(edits[0].range.start.line, 0);
    assert_eq!(edits[0].range.start.character, 3);

    drop(server_task.await.unwrap());
}

#[tokio::test]
async fn null_formatting_result_means_no_edits() {
    let (endpoint, mut server) = connected();

    let server_task = tokio::spawn(async move {
        server.accept_handshake().await;
        let formatting = server.recv().await;
        server.respond(&formatting["id"], Value::Null).await;
        server
    });

    let session = LspSession::connect(endpoint, &json!({})).await.unwrap();
    let edits = session.format("file:///work/a.xml", &json!({})).await.unwrap();
    assert!(edits.is_empty());

    drop(server_task.await.unwrap());
}

#[tokio::test]
async fn formatting_error_response_propagates() {
    let (endpoint, mut server) = connected();

    let server_task = tokio::spawn(async move {
        server.accept_handshake().await;
        let formatting = server.recv().await;
        server
            .send(json!({
                "jsonrpc": "2.0",
                "id": formatting["id"],
                "error": {"code": -32603, "message": "internal error"}
            }))
            .await;
        server
    });

    let session = LspSession::connect(endpoint, &json!({})).await.unwrap();
    let err = session
        .format("file:///work/a.xml", &json!({}))
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("internal error"));

    drop(server_task.await.unwrap());
}

#[tokio::test]
async fn format_file_rewrites_a_changed_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("doc.xml");
    std::fs::write(&path, "<a>\n<b/>\n</a>\n").unwrap();

    let (endpoint, mut server) = connected();
    let server_task = tokio::spawn(async move {
        server.accept_handshake().await;

        let did_open = server.recv().await;
        assert_eq!(did_open["method"], "textDocument/didOpen");
        let uri = did_open["params"]["textDocument"]["uri"].as_str().unwrap();
        assert!(uri.starts_with("file://"), "got uri {uri}");
        assert!(uri.ends_with("/doc.xml"), "got uri {uri}");

        let formatting = server.recv().await;
        assert_eq!(
            formatting["params"]["textDocument"]["uri"].as_str().unwrap(),
            uri
        );
        // Indent the <b/> line by two spaces.
        server
            .respond(
                &formatting["id"],
                json!([{
                    "range": {
                        "start": {"line": 1, "character": 0},
                        "end": {"line": 1, "character": 0}
                    },
                    "newText": "  "
                }]),
            )
            .await;
        server
    });

    let session = LspSession::connect(endpoint, &json!({})).await.unwrap();
    let changed = format_file(&session, &path, &json!({})).await.unwrap();

    assert!(changed);
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "<a>\n  <b/>\n</a>\n"
    );

    drop(server_task.await.unwrap());
}

#[tokio::test]
async fn format_file_with_no_edits_leaves_bytes_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("doc.xml");
    std::fs::write(&path, "<already-formatted/>\n").unwrap();

    let (endpoint, mut server) = connected();
    let server_task = tokio::spawn(async move {
        server.accept_handshake().await;
        let _did_open = server.recv().await;
        let formatting = server.recv().await;
        server.respond(&formatting["id"], json!([])).await;
        server
    });

    let session = LspSession::connect(endpoint, &json!({})).await.unwrap();
    let changed = format_file(&session, &path, &json!({})).await.unwrap();

    assert!(!changed);
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "<already-formatted/>\n"
    );

    drop(server_task.await.unwrap());
}

#[tokio::test]
async fn empty_file_is_skipped_without_a_formatting_request() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.xml");
    std::fs::write(&path, "").unwrap();

    let (endpoint, mut server) = connected();
    let server_task = tokio::spawn(async move {
        server.accept_handshake().await;
        // Nothing else must arrive for an empty file; the stream closing
        // with no didOpen/formatting frame is the passing condition.
        let next = server.reader.recv().await.expect("reading client frame");
        assert!(next.is_none(), "unexpected frame for empty file: {next:?}");
    });

    let session = LspSession::connect(endpoint, &json!({})).await.unwrap();
    let changed = format_file(&session, &path, &json!({})).await.unwrap();
    assert!(!changed);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "");

    session.close().await;
    server_task.await.unwrap();
}
