//! REST backends against a local stub server

use pantry_core::{
    BlobStore, DocumentStore, FirebaseConfig, ImageBlob, ImageSource, ImageUploader,
    InventoryStore, ItemSubmission, PantryError, Unit, UpsertWorkflow,
};
use pantry_firebase::{FirebaseStorage, FirestoreDocumentStore};
use pretty_assertions::assert_eq;
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

#[derive(Debug, Clone)]
struct Recorded {
    method: String,
    target: String,
    body: String,
}

impl Recorded {
    fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

/// Answers one connection per canned response, in order
struct StubServer {
    base: String,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl StubServer {
    async fn start(responses: Vec<(u16, Value)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));

        let seen = Arc::clone(&requests);
        tokio::spawn(async move {
            for (status, body) in responses {
                let (mut stream, _) = listener.accept().await.unwrap();
                let request = read_request(&mut stream).await;
                seen.lock().unwrap().push(request);

                let body = body.to_string();
                let reply = format!(
                    "HTTP/1.1 {status} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                stream.write_all(reply.as_bytes()).await.unwrap();
                stream.shutdown().await.unwrap();
            }
        });

        Self { base, requests }
    }

    fn config(&self) -> FirebaseConfig {
        FirebaseConfig {
            project_id: "head-starter".to_string(),
            api_key: "test-key".to_string(),
            storage_bucket: "head-starter.appspot.com".to_string(),
            firestore_url: format!("{}/v1", self.base),
            storage_url: format!("{}/v0", self.base),
        }
    }

    fn firestore(&self) -> FirestoreDocumentStore {
        FirestoreDocumentStore::new(Client::new(), &self.config()).unwrap()
    }

    fn storage(&self) -> FirebaseStorage {
        FirebaseStorage::new(Client::new(), &self.config()).unwrap()
    }

    fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }
}

async fn read_request(stream: &mut TcpStream) -> Recorded {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let head_end = loop {
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client closed before sending a full request");
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);
    while buf.len() < head_end + content_length {
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client closed mid-body");
        buf.extend_from_slice(&chunk[..n]);
    }

    let mut request_line = head.lines().next().unwrap_or_default().split_whitespace();
    Recorded {
        method: request_line.next().unwrap_or_default().to_string(),
        target: request_line.next().unwrap_or_default().to_string(),
        body: String::from_utf8_lossy(&buf[head_end..head_end + content_length]).to_string(),
    }
}

fn document(key: &str, quantity: f64) -> Value {
    json!({
        "name": format!("projects/head-starter/databases/(default)/documents/inventory/{key}"),
        "fields": {
            "quantity": { "doubleValue": quantity },
            "unit": { "stringValue": "kilograms" },
            "expiryDate": { "stringValue": "" },
            "category": { "stringValue": "Produce" },
            "imageUrl": { "stringValue": "" }
        }
    })
}

#[tokio::test]
async fn list_follows_page_tokens() {
    let server = StubServer::start(vec![
        (200, json!({ "documents": [document("Apple", 3.0)], "nextPageToken": "page-2" })),
        (200, json!({ "documents": [document("Milk", 1.5)] })),
    ])
    .await;

    let docs = server.firestore().list("inventory").await.unwrap();
    let keys: Vec<_> = docs.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(keys, vec!["Apple", "Milk"]);
    assert_eq!(docs[1].1.get("quantity"), Some(&json!(1.5)));

    let requests = server.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].method, "GET");
    assert!(requests[0]
        .target
        .starts_with("/v1/projects/head-starter/databases/(default)/documents/inventory?key=test-key"));
    assert!(requests[1].target.contains("pageToken=page-2"));
}

#[tokio::test]
async fn list_skips_undecodable_documents() {
    let broken = json!({
        "name": "projects/head-starter/databases/(default)/documents/inventory/Broken",
        "fields": { "quantity": { "doubleValue": "NaN" } }
    });
    let page = json!({ "documents": [document("Apple", 3.0), broken, document("Milk", 1.5)] });
    let server = StubServer::start(vec![(200, page.clone()), (200, page)]).await;

    let docs = server.firestore().list("inventory").await.unwrap();
    let keys: Vec<_> = docs.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(keys, vec!["Apple", "Milk"]);

    let items = InventoryStore::new(Arc::new(server.firestore()), "inventory")
        .list()
        .await
        .unwrap();
    let names: Vec<_> = items.iter().map(|i| i.name.to_string()).collect();
    assert_eq!(names, vec!["Apple", "Milk"]);
}

#[tokio::test]
async fn missing_document_is_none() {
    let server = StubServer::start(vec![(404, json!({ "error": { "code": 404 } }))]).await;
    let doc = server.firestore().get("inventory", "Ghost").await.unwrap();
    assert_eq!(doc, None);
}

#[tokio::test]
async fn partial_update_sends_mask_and_precondition() {
    let server = StubServer::start(vec![
        (200, document("Milk", 4.0)),
        (404, json!({ "error": { "code": 404, "status": "NOT_FOUND" } })),
    ])
    .await;
    let store = server.firestore();

    let mut fields = serde_json::Map::new();
    fields.insert("quantity".to_string(), json!(4.0));
    store.update("inventory", "Milk", fields.clone()).await.unwrap();

    let err = store.update("inventory", "Ghost", fields).await.unwrap_err();
    match err {
        PantryError::Remote(remote) => assert_eq!(remote.status, Some(404)),
        other => panic!("expected Remote, got {other:?}"),
    }

    let first = &server.requests()[0];
    assert_eq!(first.method, "PATCH");
    assert!(first.target.contains("updateMask.fieldPaths=quantity"));
    assert!(first.target.contains("currentDocument.exists=true"));
    assert_eq!(
        first.json(),
        json!({ "fields": { "quantity": { "doubleValue": 4.0 } } })
    );
}

#[tokio::test]
async fn upload_then_resolve_download_url() {
    let meta = json!({
        "name": "images/Milk",
        "bucket": "head-starter.appspot.com",
        "contentType": "image/jpeg",
        "downloadTokens": "tok-1,tok-2"
    });
    let server = StubServer::start(vec![(200, meta.clone()), (200, meta)]).await;
    let storage = server.storage();

    storage
        .put("images/Milk", ImageBlob::jpeg(vec![0xFF, 0xD8, 0xFF]))
        .await
        .unwrap();
    let url = storage.url("images/Milk").await.unwrap();

    assert_eq!(
        url,
        format!(
            "{}/v0/b/head-starter.appspot.com/o/images%2FMilk?alt=media&token=tok-1",
            server.base
        )
    );

    let requests = server.requests();
    assert_eq!(requests[0].method, "POST");
    assert_eq!(
        requests[0].target,
        "/v0/b/head-starter.appspot.com/o?name=images%2FMilk"
    );
    assert_eq!(requests[1].method, "GET");
}

#[tokio::test]
async fn server_error_is_recoverable() {
    let server = StubServer::start(vec![(503, json!({ "error": "unavailable" }))]).await;
    let err = server.firestore().list("inventory").await.unwrap_err();
    assert!(err.is_recoverable());
}

#[tokio::test]
async fn submission_end_to_end() {
    let meta = json!({ "name": "images/Milk", "downloadTokens": "tok" });
    let server = StubServer::start(vec![
        (404, json!({})),
        (200, meta.clone()),
        (200, meta),
        (200, document("Milk", 2.0)),
    ])
    .await;

    let workflow = UpsertWorkflow::new(
        InventoryStore::new(Arc::new(server.firestore()), "inventory"),
        ImageUploader::new(Arc::new(server.storage()), "images/"),
    );
    let outcome = workflow
        .submit(
            ItemSubmission::new("Milk", "2")
                .with_unit(Unit::Liters)
                .with_image(ImageSource::Captured(ImageBlob::jpeg(vec![1, 2, 3]))),
        )
        .await
        .unwrap();
    assert!(outcome.image_uploaded);

    let write = server.requests().pop().unwrap();
    assert_eq!(write.method, "PATCH");
    let fields = &write.json()["fields"];
    assert_eq!(fields["quantity"], json!({ "doubleValue": 2.0 }));
    assert_eq!(fields["unit"], json!({ "stringValue": "liters" }));
    assert!(fields["imageUrl"]["stringValue"]
        .as_str()
        .unwrap()
        .ends_with("/o/images%2FMilk?alt=media&token=tok"));
}
