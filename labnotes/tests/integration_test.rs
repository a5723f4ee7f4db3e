//! Integration tests for labnotes
//!
//! These tests verify end-to-end functionality including:
//! - On-disk database bootstrap and entry lifecycle
//! - Form filtering, pagination and counts through the command layer
//! - Free-text search against a stand-in completion service

use labnotes::app::AppState;
use labnotes::commands::{self, NlSearchRequest, PageRequest};
use labnotes::database::{create_pool, CreateEntryRequest, PoolConfig, Repository};
use labnotes::search::{ExtractorChain, FilterCriteria, KeywordExtractor, LlmConfig, LlmExtractor};
use labnotes::services::settings::AppSettings;
use labnotes::services::SearchService;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const KEYWORD_EXPLANATION: &str = "I'm searching based on keywords I extracted from your query.";

fn form(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Application state over a fresh data directory, keyword search only
async fn create_test_state() -> (AppState, TempDir) {
    let temp_dir = TempDir::new().unwrap();

    let mut settings = AppSettings::default();
    settings.llm.enabled = false;
    settings.resolve_paths(temp_dir.path());
    std::fs::create_dir_all(&settings.conditions.taxonomy_dir).unwrap();
    std::fs::write(
        settings.conditions.taxonomy_dir.join("default.json"),
        r#"{"Buffer": {"pH": ["acidic", "basic"]}}"#,
    )
    .unwrap();

    let state = AppState::initialize(&settings).await.unwrap();
    (state, temp_dir)
}

async fn create_test_repo() -> (Repository, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let config = PoolConfig {
        max_connections: 2,
        ..PoolConfig::default()
    };
    let pool = create_pool(&temp_dir.path().join("test.db"), config).await.unwrap();
    (Repository::new(pool), temp_dir)
}

async fn insert(state: &AppState, author: &str, date: &str, tags: &str, name: &str) -> String {
    let reply = commands::insert_entry(
        state,
        author,
        &form(&[
            ("date", date),
            ("Tags", tags),
            ("File_Path", ""),
            ("Notes", ""),
            ("entry_name", name),
            ("parent_entry", ""),
        ]),
    )
    .await;
    assert!(reply.success, "insert failed: {}", reply.message);
    reply.data.unwrap()
}

fn llm_service(repo: Repository, server: &MockServer) -> SearchService {
    let config = LlmConfig {
        api_url: format!("{}/v1/messages", server.uri()),
        api_key: Some("test-key".to_string()),
        timeout_secs: 5,
        ..LlmConfig::default()
    };
    let chain = ExtractorChain::new()
        .with(Arc::new(LlmExtractor::new(config).unwrap()))
        .with(Arc::new(KeywordExtractor::new()));
    SearchService::new(repo, chain)
}

fn completion(text: &str) -> serde_json::Value {
    serde_json::json!({
        "id": "msg_1",
        "type": "message",
        "role": "assistant",
        "content": [{"type": "text", "text": text}]
    })
}

#[tokio::test]
async fn test_tag_filter_returns_only_alice() {
    let (state, _temp) = create_test_state().await;
    insert(&state, "alice", "2024-01-02", "pcr, gel", "Run A").await;
    insert(&state, "bob", "2024-01-03", "western", "Run B").await;

    let reply = commands::filter_form(&state, &form(&[("Tags", "pcr")])).await;

    assert!(reply.success);
    let entries = reply.data.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].author, "alice");
}

#[tokio::test]
async fn test_hash_id_overrides_author() {
    let (state, _temp) = create_test_state().await;
    let hash_id = insert(&state, "alice", "2024-01-02", "", "Run A").await;
    insert(&state, "bob", "2024-01-03", "", "Run B").await;

    let fragment = &hash_id[2..8];
    let criteria: FilterCriteria = serde_json::from_value(serde_json::json!({
        "Hash_ID": fragment,
        "Author": "bob"
    }))
    .unwrap();
    assert_eq!(criteria.build().predicate, "id_hash LIKE ?");

    let entries = commands::filter_entries(&state, &criteria).await.data.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].hash_id, hash_id);
}

#[tokio::test]
async fn test_realtime_pages_agree_with_count() {
    let (state, _temp) = create_test_state().await;
    for day in 10..=24 {
        insert(&state, "carol", &format!("2024-03-{day}"), "elisa", "Plate").await;
    }

    let criteria = FilterCriteria {
        author: Some("carol".to_string()),
        date_bool: true,
        date_start: Some("2024-03-12".to_string()),
        ..FilterCriteria::default()
    };

    let total = commands::count_matching_entries(&state, &criteria).await.data.unwrap();
    assert_eq!(total, 13);

    let mut dates = Vec::new();
    let mut offset = Some(0);
    while let Some(next) = offset {
        let page = commands::realtime_filter_entries(
            &state,
            &criteria,
            PageRequest {
                offset: Some(next),
                limit: Some(5),
            },
        )
        .await
        .data
        .unwrap();
        assert_eq!(page.total, total);
        dates.extend(page.entries.into_iter().map(|e| e.date));
        offset = page.next_offset;
    }

    assert_eq!(dates.len(), 13);
    assert_eq!(dates.first().map(String::as_str), Some("2024-03-24"));
    assert_eq!(dates.last().map(String::as_str), Some("2024-03-12"));
}

#[tokio::test]
async fn test_entry_family_lifecycle() {
    let (state, _temp) = create_test_state().await;
    let parent_hash = insert(&state, "dave", "2024-04-01", "", "Culture").await;

    let child = commands::insert_entry(
        &state,
        "dave",
        &form(&[
            ("date", "2024-04-02"),
            ("entry_name", "Passage 1"),
            ("parent_entry", parent_hash.as_str()),
            ("condition&Buffer&pH&acidic", "on"),
        ]),
    )
    .await;
    assert!(child.success);
    assert!(child.message.contains("hash_id"));

    let missing_parent = commands::insert_entry(
        &state,
        "dave",
        &form(&[
            ("date", "2024-04-02"),
            ("entry_name", "Orphan"),
            ("parent_entry", "ZZZZZZZZZZ"),
        ]),
    )
    .await;
    assert!(!missing_parent.success);
    assert!(missing_parent.message.contains("Parent entry does not exist"));

    let parent = commands::get_entry_by_hash(&state, &parent_hash).await.data.unwrap();
    assert_eq!(parent.family.children.len(), 1);

    let child_hash = child.data.unwrap();
    let details = commands::get_entry_by_hash(&state, &child_hash).await.data.unwrap();
    assert_eq!(details.entry.conditions, vec!["acidic"]);
    assert_eq!(details.family.parent.map(|p| p.entry_name).as_deref(), Some("Culture"));

    assert!(commands::delete_entry(&state, parent.entry.id).await.success);

    let details = commands::get_entry_by_hash(&state, &child_hash).await.data.unwrap();
    assert!(details.family.parent.is_none());
}

#[tokio::test]
async fn test_templates_round_trip_through_commands() {
    let (state, _temp) = create_test_state().await;
    assert!(commands::provision_user(&state, "erin").await.success);

    let saved = commands::save_templates(
        &state,
        "erin",
        &form(&[
            ("condition&default&Buffer&pH&basic", "on"),
            ("new_template_name", "staining"),
            ("delete&ghost", "on"),
        ]),
    )
    .await;
    assert!(saved.success);
    assert!(saved.message.contains("ghost"));

    let merged = commands::conditions_by_template_and_method(&state, "erin", "staining", "default")
        .await
        .data
        .unwrap();
    let json = serde_json::to_value(&merged.conditions).unwrap();
    assert_eq!(
        json,
        serde_json::json!({"Buffer": {"pH": [["acidic", ""], ["basic", "checked"]]}})
    );

    let listed = commands::list_templates(&state, "erin").await.data.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].template_name, "default");
}

#[tokio::test]
async fn test_nl_search_usage_question_through_command() {
    let (state, _temp) = create_test_state().await;
    insert(&state, "alice", "2024-01-02", "", "Run A").await;

    let reply = commands::nl_search(
        &state,
        NlSearchRequest {
            query: "how do I search for entries?".to_string(),
        },
    )
    .await;

    assert!(reply.success);
    assert!(reply.entries.is_empty());
    assert!(!reply.message.is_empty());

    let empty = commands::nl_search(&state, NlSearchRequest { query: "  ".to_string() }).await;
    assert!(!empty.success);
}

#[tokio::test]
async fn test_llm_reply_drives_search() {
    let server = MockServer::start().await;
    let reply = r#"{"is_usage_question": false, "keywords": ["protein", "synthesis"],
        "author": "john", "date_start": "2024-06-01", "date_end": "2024-06-15",
        "explanation": "Entries by john about protein synthesis"}"#;

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(reply)))
        .expect(1)
        .mount(&server)
        .await;

    let (repo, _temp) = create_test_repo().await;
    for (author, date, name) in [
        ("john", "2024-06-10", "Protein synthesis assay"),
        ("john", "2024-05-01", "Protein synthesis assay"),
        ("mary", "2024-06-10", "Protein synthesis assay"),
    ] {
        repo.create_entry(CreateEntryRequest {
            author: author.to_string(),
            date: date.to_string(),
            entry_name: name.to_string(),
            ..CreateEntryRequest::default()
        })
        .await
        .unwrap();
    }

    let service = llm_service(repo, &server);
    let outcome = service.nl_search("protein synthesis by john lately").await.unwrap();

    assert_eq!(outcome.message(), "Entries by john about protein synthesis");
    assert_eq!(outcome.entries.len(), 1);
    assert_eq!(outcome.entries[0].date, "2024-06-10");
}

#[tokio::test]
async fn test_server_error_falls_back_to_keywords() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(500).set_body_string("overloaded"))
        .expect(1)
        .mount(&server)
        .await;

    let (repo, _temp) = create_test_repo().await;
    repo.create_entry(CreateEntryRequest {
        author: "john".to_string(),
        date: "2024-06-10".to_string(),
        entry_name: "Protein synthesis".to_string(),
        ..CreateEntryRequest::default()
    })
    .await
    .unwrap();

    let service = llm_service(repo, &server);
    let outcome = service
        .nl_search("entries by john about protein synthesis")
        .await
        .unwrap();

    assert_eq!(outcome.message(), KEYWORD_EXPLANATION);
    assert_eq!(outcome.params.author.as_deref(), Some("john"));
    assert_eq!(outcome.entries.len(), 1);
}

#[tokio::test]
async fn test_unreadable_reply_gets_one_follow_up() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("I am not sure.")))
        .expect(2)
        .mount(&server)
        .await;

    let (repo, _temp) = create_test_repo().await;
    let service = llm_service(repo, &server);

    let outcome = service.nl_search("gel electrophoresis results").await.unwrap();
    assert_eq!(outcome.message(), KEYWORD_EXPLANATION);
    assert_eq!(
        outcome.params.text.as_deref(),
        Some("electrophoresis results")
    );
}

#[tokio::test]
async fn test_empty_object_reply_does_not_match_everything() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("Sure: {}")))
        .expect(2)
        .mount(&server)
        .await;

    let (repo, _temp) = create_test_repo().await;
    for name in ["Gel electrophoresis run", "Plasmid prep"] {
        repo.create_entry(CreateEntryRequest {
            author: "john".to_string(),
            date: "2024-06-10".to_string(),
            entry_name: name.to_string(),
            ..CreateEntryRequest::default()
        })
        .await
        .unwrap();
    }

    let service = llm_service(repo, &server);
    let outcome = service.nl_search("plasmid prep").await.unwrap();

    assert_eq!(outcome.message(), KEYWORD_EXPLANATION);
    assert_eq!(outcome.entries.len(), 1);
    assert_eq!(outcome.entries[0].title, "Plasmid prep");
}
