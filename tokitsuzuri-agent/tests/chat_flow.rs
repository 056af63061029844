use mockito::Matcher;
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;
use tokitsuzuri_agent::{DiaryApp, CHAT_SYSTEM_PROMPT, DIARY_SYSTEM_PROMPT};
use tokitsuzuri_core::config::Config;
use tokitsuzuri_core::speech::SpeechPlayback;
use tokitsuzuri_core::{Capabilities, Error, FileStore, KeyValueStore, Message, Screen};
use tokitsuzuri_providers::OpenAiClientFactory;

fn open_app(server: &mockito::Server, dir: &TempDir) -> DiaryApp {
    let mut config = Config::default();
    config.completion.api_base = server.url();
    config.completion.timeout_secs = 5;

    let store: Arc<dyn KeyValueStore> =
        Arc::new(FileStore::open(dir.path(), config.storage.quota_bytes).unwrap());
    let factory = Arc::new(OpenAiClientFactory::new(&config.completion));
    DiaryApp::new(
        config,
        store,
        factory,
        Capabilities::default(),
        SpeechPlayback::unavailable("ja-JP"),
    )
}

fn reply_body(content: &str) -> String {
    json!({"choices": [{"message": {"role": "assistant", "content": content}}]}).to_string()
}

#[tokio::test]
async fn test_first_message_round_trip() {
    let mut server = mockito::Server::new_async().await;
    let dir = TempDir::new().unwrap();
    let mock = server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer sk-test")
        .match_body(Matcher::PartialJson(json!({
            "messages": [
                {"role": "system", "content": CHAT_SYSTEM_PROMPT},
                {"role": "user", "content": "今日は楽しかった"}
            ],
            "max_tokens": 500
        })))
        .with_status(200)
        .with_body(reply_body("良かったですね"))
        .expect(1)
        .create_async()
        .await;

    let mut app = open_app(&server, &dir);
    app.set_api_key("sk-test").unwrap();
    app.send_message("今日は楽しかった").await.unwrap();

    assert_eq!(
        app.messages(),
        &[
            Message::user("今日は楽しかった"),
            Message::assistant("良かったですね")
        ]
    );
    mock.assert_async().await;
}

#[tokio::test]
async fn test_rejected_credential_keeps_user_turn() {
    let mut server = mockito::Server::new_async().await;
    let dir = TempDir::new().unwrap();
    let _mock = server
        .mock("POST", "/chat/completions")
        .with_status(401)
        .with_body(r#"{"error":{"message":"Incorrect API key provided"}}"#)
        .create_async()
        .await;

    let mut app = open_app(&server, &dir);
    app.set_api_key("sk-revoked").unwrap();
    let err = app.send_message("こんばんは").await.unwrap_err();

    assert!(matches!(err, Error::CredentialInvalid));
    assert_eq!(app.messages(), &[Message::user("こんばんは")]);
}

#[tokio::test]
async fn test_save_appends_one_record_with_larger_id() {
    let mut server = mockito::Server::new_async().await;
    let dir = TempDir::new().unwrap();
    let _chat = server
        .mock("POST", "/chat/completions")
        .match_body(Matcher::PartialJson(json!({"max_tokens": 500})))
        .with_status(200)
        .with_body(reply_body("どこへ行きましたか？"))
        .create_async()
        .await;
    let diary = server
        .mock("POST", "/chat/completions")
        .match_body(Matcher::AllOf(vec![
            Matcher::PartialJson(json!({"max_tokens": 800})),
            Matcher::Regex(DIARY_SYSTEM_PROMPT.to_string()),
        ]))
        .with_status(200)
        .with_body(reply_body("# 公園の一日\n\n公園へ行った。"))
        .expect(1)
        .create_async()
        .await;

    let mut app = open_app(&server, &dir);
    app.set_api_key("sk-test").unwrap();
    app.import_json(
        r##"{"diaries":[{"id":1700000000000,"date":"2023/11/15 7:13:20","content":"# 前の日記","chatHistory":[]}],"version":"1.0.0","exportDate":"2023-11-15T00:00:00.000Z"}"##,
    )
    .unwrap();
    let before = app.list_diaries();

    app.send_message("公園へ行った").await.unwrap();
    let record = app.save_diary().await.unwrap();

    let after = app.list_diaries();
    assert_eq!(after.len(), before.len() + 1);
    assert!(before.iter().all(|r| record.id > r.id));
    assert_eq!(after[0], record);
    assert_eq!(record.chat_history.len(), 2);
    assert_eq!(app.screen(), Screen::DiaryList);
    assert!(app.messages().is_empty());
    diary.assert_async().await;
}

#[tokio::test]
async fn test_empty_compose_sends_nothing() {
    let mut server = mockito::Server::new_async().await;
    let dir = TempDir::new().unwrap();
    let mock = server
        .mock("POST", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let mut app = open_app(&server, &dir);
    app.set_api_key("sk-test").unwrap();
    let err = app.save_diary().await.unwrap_err();

    assert!(matches!(err, Error::EmptyConversation));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_export_import_between_stores() {
    let server = mockito::Server::new_async().await;
    let source_dir = TempDir::new().unwrap();
    let target_dir = TempDir::new().unwrap();

    let mut source = open_app(&server, &source_dir);
    source.set_api_key("sk-secret").unwrap();
    source.set_model("gpt-4o-mini").unwrap();
    source
        .import_json(r##"{"diaries":[{"id":5,"date":"d","content":"# 五","chatHistory":[{"role":"user","content":"五"}]}]}"##)
        .unwrap();
    let exported = source.export(chrono::Utc::now()).to_json().unwrap();
    assert!(!exported.contains("sk-secret"));

    let mut target = open_app(&server, &target_dir);
    target.import_json(&exported).unwrap();
    assert_eq!(target.list_diaries(), source.list_diaries());
    assert_eq!(target.settings().model, "gpt-4o-mini");
    assert!(!target.settings().has_credential());

    let reopened = open_app(&server, &target_dir);
    assert_eq!(reopened.list_diaries(), source.list_diaries());
    assert!(target.delete_diary(5).unwrap());
    assert!(target.list_diaries().is_empty());
}
