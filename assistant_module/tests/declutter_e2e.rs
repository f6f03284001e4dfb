mod test_support;

use mockito::{Matcher, Server};
use serde_json::json;
use tempfile::TempDir;

use assistant_module::category_store::CategoryStore;
use assistant_module::declutter::{
    self, DeclutterDeps, DeclutterRequest, DeclutterStore, SuggestedAction,
    DEFAULT_DECLUTTER_QUERY,
};
use classify_module::{LlmClient, LlmConfig};

use test_support::{classification, encode, full_message, message_list, EnvGuard, ENV_MUTEX};

const USER: &str = "me@example.com";

fn llm_client(base_url: String) -> LlmClient {
    LlmClient::new(LlmConfig {
        api_key: "test-key".to_string(),
        base_url,
        classify_model: "test-classify".to_string(),
        draft_model: "test-draft".to_string(),
    })
    .unwrap()
}

fn scan_request() -> DeclutterRequest {
    DeclutterRequest {
        user_email: USER.to_string(),
        access_token: "scan-token".to_string(),
        refresh_token: None,
        max_emails: None,
        query: None,
    }
}

async fn mock_list(server: &mut Server, entries: &[(&str, &str)]) -> mockito::Mock {
    server
        .mock("GET", "/gmail/v1/users/me/messages")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("maxResults".into(), "50".into()),
            Matcher::UrlEncoded("q".into(), DEFAULT_DECLUTTER_QUERY.into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(message_list(entries).to_string())
        .create_async()
        .await
}

async fn mock_message(server: &mut Server, id: &str, body: serde_json::Value) -> mockito::Mock {
    server
        .mock("GET", &*format!("/gmail/v1/users/me/messages/{id}"))
        .match_query(Matcher::UrlEncoded("format".into(), "full".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
        .create_async()
        .await
}

#[tokio::test]
async fn declutter_flags_spam_dominant_senders() {
    let _lock = ENV_MUTEX.lock().unwrap();
    let mut server = Server::new_async().await;
    let _gmail_base = EnvGuard::set("GMAIL_API_BASE_URL", server.url());

    let list = mock_list(&mut server, &[("d1", "td1"), ("d2", "td2"), ("a1", "ta1")]).await;
    let _d1 = mock_message(
        &mut server,
        "d1",
        full_message(
            "d1",
            "td1",
            "60% off everything",
            "Shop Deals <deals@shop.example>",
            "Flash sale ends tonight.",
        ),
    )
    .await;
    let _d2 = mock_message(
        &mut server,
        "d2",
        full_message(
            "d2",
            "td2",
            "Last chance",
            "Shop Deals <deals@shop.example>",
            "Final hours. Click unsubscribe to stop these offers.",
        ),
    )
    .await;
    let _a1 = mock_message(
        &mut server,
        "a1",
        full_message(
            "a1",
            "ta1",
            "Lunch tomorrow?",
            "Alice Chen <alice@example.com>",
            "Want to grab lunch tomorrow?",
        ),
    )
    .await;
    // The prompt embeds the sender address, so the body regex tells the
    // two senders' calls apart.
    let spam_calls = server
        .mock("POST", "/v1/messages")
        .match_body(Matcher::Regex("deals@shop.example".to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(classification(8, 0.9, "bulk promotion"))
        .expect(2)
        .create_async()
        .await;
    let personal_call = server
        .mock("POST", "/v1/messages")
        .match_body(Matcher::Regex("alice@example.com".to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(classification(1, 0.9, "personal note"))
        .expect(1)
        .create_async()
        .await;

    let temp = TempDir::new().unwrap();
    let categories = CategoryStore::new(temp.path().join("categories.db")).unwrap();
    let store = DeclutterStore::new(temp.path().join("declutter.db")).unwrap();
    let llm = llm_client(server.url());
    let deps = DeclutterDeps {
        llm: &llm,
        categories: &categories,
        store: &store,
    };

    let summary = declutter::run_scan(&deps, &scan_request()).await.unwrap();
    assert_eq!(summary.scanned, 3);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.candidates.len(), 1);
    assert_eq!(summary.candidates[0].sender_email, "deals@shop.example");
    assert_eq!(summary.candidates[0].message_count, 2);
    assert_eq!(summary.candidates[0].suggested, SuggestedAction::Unsubscribe);

    let (scan, stored) = store.latest_scan(USER).unwrap().unwrap();
    assert_eq!(scan.id, summary.scan_id);
    assert_eq!(scan.query, DEFAULT_DECLUTTER_QUERY);
    assert_eq!(scan.scanned, 3);
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].sender_email, "deals@shop.example");
    assert_eq!(stored[0].suggested, SuggestedAction::Unsubscribe);

    list.assert_async().await;
    spam_calls.assert_async().await;
    personal_call.assert_async().await;
}

#[tokio::test]
async fn emails_without_sender_are_counted_failed() {
    let _lock = ENV_MUTEX.lock().unwrap();
    let mut server = Server::new_async().await;
    let _gmail_base = EnvGuard::set("GMAIL_API_BASE_URL", server.url());

    let _list = mock_list(&mut server, &[("x1", "tx1")]).await;
    let orphan = json!({
        "id": "x1",
        "threadId": "tx1",
        "snippet": "",
        "internalDate": "1724300000000",
        "payload": {
            "mimeType": "text/plain",
            "headers": [{"name": "Subject", "value": "no sender here"}],
            "body": {"data": encode("this message carries no From header")},
        }
    });
    let _message = mock_message(&mut server, "x1", orphan).await;
    let llm_calls = server
        .mock("POST", "/v1/messages")
        .with_status(200)
        .with_body(classification(8, 0.9, "unused"))
        .expect(0)
        .create_async()
        .await;

    let temp = TempDir::new().unwrap();
    let categories = CategoryStore::new(temp.path().join("categories.db")).unwrap();
    let store = DeclutterStore::new(temp.path().join("declutter.db")).unwrap();
    let llm = llm_client(server.url());
    let deps = DeclutterDeps {
        llm: &llm,
        categories: &categories,
        store: &store,
    };

    let summary = declutter::run_scan(&deps, &scan_request()).await.unwrap();
    assert_eq!(summary.scanned, 1);
    assert_eq!(summary.failed, 1);
    assert!(summary.candidates.is_empty());
    llm_calls.assert_async().await;
}
