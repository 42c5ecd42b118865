//! End-to-end publish pipeline: captured content → remote document.
//!
//! Strict phase order: create the empty document, segment the content,
//! then create blocks batch by batch with media transferred per batch.
//! There is no compensating delete — if a later batch fails, the partially
//! written document stays on the remote side and the error propagates.

use std::time::Duration;

use tracing::{info, instrument, warn};

use clippress_api::ApiClient;
use clippress_shared::{ClippressError, CompletionRecord, Result};

use crate::publisher;
use crate::uploads::ImageReport;

/// Timeout for image source downloads.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// User-Agent string for image source downloads.
const USER_AGENT: &str = concat!("Clippress/", env!("CARGO_PKG_VERSION"));

/// One publish operation's input.
#[derive(Debug, Clone)]
pub struct PublishRequest {
    /// Document title.
    pub title: String,
    /// Captured content: prose with inline `![alt](url)` image markers.
    pub content: String,
    /// Folder to create the document under.
    pub folder_token: String,
}

/// Outcome of a successful publish.
#[derive(Debug, Clone)]
pub struct PublishReport {
    /// Where the document lives.
    pub record: CompletionRecord,
    /// Per-image transfer outcomes, in document order.
    pub images: Vec<ImageReport>,
}

/// Publish captured content as a new document.
///
/// `doc_link_base` is the human-followable link prefix; the final href is
/// `<doc_link_base>/<document_id>`.
#[instrument(skip_all, fields(title = %request.title, folder = %request.folder_token))]
pub async fn publish(
    client: &ApiClient,
    doc_link_base: &str,
    request: &PublishRequest,
) -> Result<PublishReport> {
    let document_id = client
        .create_document(&request.folder_token, &request.title)
        .await?;
    info!(%document_id, "document created");

    let segments = clippress_content::segment(&request.content);
    let image_count = segments.iter().filter(|s| s.is_image()).count();
    info!(
        segments = segments.len(),
        images = image_count,
        "content segmented"
    );

    let downloader = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(DOWNLOAD_TIMEOUT)
        .build()
        .map_err(|e| ClippressError::Transport(format!("failed to build HTTP client: {e}")))?;

    let images = publisher::publish_blocks(client, &downloader, &document_id, &segments)
        .await
        .inspect_err(|e| {
            // No rollback: whatever batches committed stay in place.
            warn!(%document_id, error = %e, "publish aborted, partial document remains");
        })?;

    let href = format!("{}/{document_id}", doc_link_base.trim_end_matches('/'));
    info!(%href, "publish complete");

    Ok(PublishReport {
        record: CompletionRecord {
            href,
            folder_token: request.folder_token.clone(),
            document_id,
        },
        images,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uploads::ImageOutcome;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

    use clippress_auth::TokenManager;
    use clippress_shared::CredentialSnapshot;

    fn client_for(server: &MockServer) -> ApiClient {
        let tokens = TokenManager::new(CredentialSnapshot {
            access_token: "u-test".into(),
            refresh_token: None,
            expires_at: None,
            relay_endpoint: String::new(),
        })
        .unwrap();
        ApiClient::new(tokens, &server.uri()).unwrap()
    }

    fn request(title: &str, content: &str) -> PublishRequest {
        PublishRequest {
            title: title.into(),
            content: content.into(),
            folder_token: "fldcnTEST".into(),
        }
    }

    /// Answers a block-creation call with as many block ids as it received
    /// children, globally unique across batches.
    struct ChildrenResponder {
        counter: AtomicUsize,
    }

    impl ChildrenResponder {
        fn new() -> Self {
            Self {
                counter: AtomicUsize::new(0),
            }
        }
    }

    impl Respond for ChildrenResponder {
        fn respond(&self, request: &Request) -> ResponseTemplate {
            let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
            let count = body["children"].as_array().map_or(0, |a| a.len());
            let ids: Vec<serde_json::Value> = (0..count)
                .map(|_| {
                    let n = self.counter.fetch_add(1, Ordering::SeqCst);
                    serde_json::json!({ "block_id": format!("blk{n}") })
                })
                .collect();
            ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": 0,
                "msg": "success",
                "data": { "children": ids },
            }))
        }
    }

    /// Answers a media upload with a fresh token per call.
    struct UploadResponder {
        counter: AtomicUsize,
    }

    impl Respond for UploadResponder {
        fn respond(&self, _request: &Request) -> ResponseTemplate {
            let n = self.counter.fetch_add(1, Ordering::SeqCst);
            ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": 0,
                "msg": "success",
                "data": { "file_token": format!("tok{n}") },
            }))
        }
    }

    async fn mount_create_document(server: &MockServer, document_id: &str) {
        Mock::given(method("POST"))
            .and(path("/documents"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": 0,
                "msg": "success",
                "data": { "document": { "document_id": document_id } },
            })))
            .mount(server)
            .await;
    }

    async fn mount_children(server: &MockServer, document_id: &str) {
        Mock::given(method("POST"))
            .and(path(format!(
                "/documents/{document_id}/blocks/{document_id}/children"
            )))
            .respond_with(ChildrenResponder::new())
            .mount(server)
            .await;
    }

    async fn mount_patch_ok(server: &MockServer, document_id: &str) {
        Mock::given(method("PATCH"))
            .and(path(format!("/documents/{document_id}/blocks/batch_update")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "code": 0, "msg": "success" })),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn text_only_publish_returns_record() {
        let server = MockServer::start().await;
        mount_create_document(&server, "doxcn1").await;
        mount_children(&server, "doxcn1").await;

        let client = client_for(&server);
        let report = publish(
            &client,
            "https://docs.example.com/docx/",
            &request("Clip", "one\ntwo\nthree"),
        )
        .await
        .unwrap();

        assert_eq!(report.record.document_id, "doxcn1");
        assert_eq!(report.record.href, "https://docs.example.com/docx/doxcn1");
        assert_eq!(report.record.folder_token, "fldcnTEST");
        assert!(report.images.is_empty());
    }

    #[tokio::test]
    async fn hundred_twenty_segments_make_three_ordered_batches() {
        let server = MockServer::start().await;
        mount_create_document(&server, "doxcn1").await;
        mount_children(&server, "doxcn1").await;

        let content = (0..120).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n");
        let client = client_for(&server);
        publish(&client, "https://d/x", &request("Clip", &content))
            .await
            .unwrap();

        let children_bodies: Vec<serde_json::Value> = server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|r| r.url.path().ends_with("/children"))
            .map(|r| serde_json::from_slice(&r.body).unwrap())
            .collect();

        let sizes: Vec<usize> = children_bodies
            .iter()
            .map(|b| b["children"].as_array().unwrap().len())
            .collect();
        assert_eq!(sizes, vec![50, 50, 20]);

        // Strictly sequential submission: batch order equals segment order.
        let first_of_each: Vec<&str> = children_bodies
            .iter()
            .map(|b| {
                b["children"][0]["text"]["elements"][0]["text_run"]["content"]
                    .as_str()
                    .unwrap()
            })
            .collect();
        assert_eq!(first_of_each, vec!["line 0", "line 50", "line 100"]);
    }

    #[tokio::test]
    async fn creation_rejection_aborts_before_any_blocks() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/documents"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": 7,
                "msg": "no permission",
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = publish(&client, "https://d/x", &request("Clip", "hello"))
            .await
            .unwrap_err();

        match err {
            ClippressError::Api { code, message } => {
                assert_eq!(code, 7);
                assert_eq!(message, "no permission");
            }
            other => panic!("expected Api error, got {other:?}"),
        }

        let children_calls = server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|r| r.url.path().ends_with("/children"))
            .count();
        assert_eq!(children_calls, 0);
    }

    #[tokio::test]
    async fn expired_session_aborts_before_any_service_call() {
        let server = MockServer::start().await;

        // Expired credentials and a relay that does not exist.
        let tokens = TokenManager::new(CredentialSnapshot {
            access_token: "u-stale".into(),
            refresh_token: Some("r-stale".into()),
            expires_at: Some(chrono_now() - 1),
            relay_endpoint: "http://127.0.0.1:9".into(),
        })
        .unwrap();
        let client = ApiClient::new(tokens, &server.uri()).unwrap();

        let err = publish(&client, "https://d/x", &request("Clip", "hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClippressError::SessionExpired(_)));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    fn chrono_now() -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64
    }

    #[tokio::test]
    async fn images_are_uploaded_and_patched_in() {
        let server = MockServer::start().await;
        mount_create_document(&server, "doxcn1").await;
        mount_children(&server, "doxcn1").await;
        mount_patch_ok(&server, "doxcn1").await;
        Mock::given(method("POST"))
            .and(path("/medias/upload_all"))
            .respond_with(UploadResponder {
                counter: AtomicUsize::new(0),
            })
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/img/shot.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3]))
            .mount(&server)
            .await;

        let content = format!("Hello\n![x]({}/img/shot.png)\nWorld", server.uri());
        let client = client_for(&server);
        let report = publish(&client, "https://d/x", &request("Clip", &content))
            .await
            .unwrap();

        assert_eq!(report.images.len(), 1);
        assert_eq!(
            report.images[0].outcome,
            ImageOutcome::Uploaded { token: "tok0".into() }
        );
        // The placeholder sits between the two text blocks.
        assert_eq!(report.images[0].block_id, "blk1");

        let patch_bodies: Vec<serde_json::Value> = server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|r| r.url.path().ends_with("/batch_update"))
            .map(|r| serde_json::from_slice(&r.body).unwrap())
            .collect();
        assert_eq!(patch_bodies.len(), 1);
        assert_eq!(
            patch_bodies[0]["requests"][0]["replace_image"]["token"],
            "tok0"
        );
        assert_eq!(patch_bodies[0]["requests"][0]["block_id"], "blk1");
    }

    #[tokio::test]
    async fn failed_image_is_omitted_but_publish_succeeds() {
        let server = MockServer::start().await;
        mount_create_document(&server, "doxcn1").await;
        mount_children(&server, "doxcn1").await;
        mount_patch_ok(&server, "doxcn1").await;
        Mock::given(method("POST"))
            .and(path("/medias/upload_all"))
            .respond_with(UploadResponder {
                counter: AtomicUsize::new(0),
            })
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/img/good1.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8]))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/img/good2.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![2u8]))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/img/missing.png"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let base = server.uri();
        let content = format!(
            "![a]({base}/img/good1.png)\n![b]({base}/img/missing.png)\n![c]({base}/img/good2.png)"
        );
        let client = client_for(&server);
        let report = publish(&client, "https://d/x", &request("Clip", &content))
            .await
            .unwrap();

        assert_eq!(report.images.len(), 3);
        let uploaded = report
            .images
            .iter()
            .filter(|r| matches!(r.outcome, ImageOutcome::Uploaded { .. }))
            .count();
        assert_eq!(uploaded, 2);

        let failed: Vec<_> = report
            .images
            .iter()
            .filter(|r| matches!(r.outcome, ImageOutcome::Failed { .. }))
            .collect();
        assert_eq!(failed.len(), 1);
        assert!(failed[0].source_url.ends_with("missing.png"));

        // The patch carries exactly the successful pair count.
        let patch_bodies: Vec<serde_json::Value> = server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|r| r.url.path().ends_with("/batch_update"))
            .map(|r| serde_json::from_slice(&r.body).unwrap())
            .collect();
        assert_eq!(patch_bodies.len(), 1);
        assert_eq!(patch_bodies[0]["requests"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn patch_is_skipped_when_no_upload_succeeds() {
        let server = MockServer::start().await;
        mount_create_document(&server, "doxcn1").await;
        mount_children(&server, "doxcn1").await;
        Mock::given(method("PATCH"))
            .and(path("/documents/doxcn1/blocks/batch_update"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "code": 0, "msg": "success" })),
            )
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/img/gone.png"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let content = format!("caption\n![x]({}/img/gone.png)", server.uri());
        let client = client_for(&server);
        let report = publish(&client, "https://d/x", &request("Clip", &content))
            .await
            .unwrap();

        assert_eq!(report.images.len(), 1);
        assert!(matches!(
            report.images[0].outcome,
            ImageOutcome::Failed { .. }
        ));
    }

    #[tokio::test]
    async fn patch_failure_is_swallowed_and_reported() {
        let server = MockServer::start().await;
        mount_create_document(&server, "doxcn1").await;
        mount_children(&server, "doxcn1").await;
        Mock::given(method("POST"))
            .and(path("/medias/upload_all"))
            .respond_with(UploadResponder {
                counter: AtomicUsize::new(0),
            })
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/img/shot.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8]))
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/documents/doxcn1/blocks/batch_update"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let content = format!("![x]({}/img/shot.png)", server.uri());
        let client = client_for(&server);
        let report = publish(&client, "https://d/x", &request("Clip", &content))
            .await
            .unwrap();

        // Publish still succeeds; the report says the image did not land.
        assert_eq!(report.record.document_id, "doxcn1");
        assert!(matches!(
            report.images[0].outcome,
            ImageOutcome::Failed { .. }
        ));
    }

    #[tokio::test]
    async fn mid_publish_batch_failure_propagates_without_rollback() {
        let server = MockServer::start().await;
        mount_create_document(&server, "doxcn1").await;

        // First children call succeeds, every later one is rejected.
        struct FailSecondBatch {
            calls: AtomicUsize,
        }
        impl Respond for FailSecondBatch {
            fn respond(&self, request: &Request) -> ResponseTemplate {
                if self.calls.fetch_add(1, Ordering::SeqCst) > 0 {
                    return ResponseTemplate::new(200).set_body_json(serde_json::json!({
                        "code": 99,
                        "msg": "quota exceeded",
                    }));
                }
                let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
                let count = body["children"].as_array().map_or(0, |a| a.len());
                let ids: Vec<serde_json::Value> = (0..count)
                    .map(|n| serde_json::json!({ "block_id": format!("blk{n}") }))
                    .collect();
                ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "code": 0,
                    "msg": "success",
                    "data": { "children": ids },
                }))
            }
        }
        Mock::given(method("POST"))
            .and(path("/documents/doxcn1/blocks/doxcn1/children"))
            .respond_with(FailSecondBatch {
                calls: AtomicUsize::new(0),
            })
            .mount(&server)
            .await;

        let content = (0..80).map(|i| format!("l{i}")).collect::<Vec<_>>().join("\n");
        let client = client_for(&server);
        let err = publish(&client, "https://d/x", &request("Clip", &content))
            .await
            .unwrap_err();
        assert!(matches!(err, ClippressError::Api { code: 99, .. }));

        // No delete call was attempted for the partial document.
        let deletes = server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|r| r.method.to_string() == "DELETE")
            .count();
        assert_eq!(deletes, 0);
    }
}
