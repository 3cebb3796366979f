use std::sync::Arc;

use docusmart::{
    config::{LanguagePolicy, ReingestPolicy},
    embedding::HashedEmbeddingClient,
    generation::OpenAiGenerationClient,
    loader::{DocumentFormat, LoaderError},
    processing::{DocumentService, ProcessingError, ServiceSettings, TranslateError},
    store::{LocalStore, StoreHandle, VectorStore},
};
use httpmock::{Method::POST, MockServer};
use lopdf::{
    Document, Object, Stream,
    content::{Content, Operation},
    dictionary,
};
use regex::Regex;
use serde_json::json;

const DIMENSION: usize = 256;

fn settings(reingest_policy: ReingestPolicy, language_policy: LanguagePolicy) -> ServiceSettings {
    ServiceSettings {
        embedding_dimension: DIMENSION,
        generation_model: "gpt-3.5-turbo-instruct".into(),
        translation_model: "gpt-3.5-turbo".into(),
        reingest_policy,
        language_policy,
    }
}

fn service(server: &MockServer, settings: ServiceSettings) -> DocumentService {
    let generation =
        OpenAiGenerationClient::new(&server.base_url(), "sk-test".into()).expect("client");
    DocumentService::from_parts(
        Arc::new(HashedEmbeddingClient::new(DIMENSION)),
        Arc::new(generation),
        settings,
    )
}

async fn local_store(dir: &tempfile::TempDir) -> StoreHandle {
    Arc::new(LocalStore::open(dir.path()).await.expect("open store"))
}

fn three_page_pdf() -> Vec<u8> {
    let pages = [
        "The office cafeteria serves lunch at noon.",
        "The secret launch code is PELICAN seven.",
        "Parking passes renew every January.",
    ];

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("encode content"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        kids.push(page_id.into());
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => 3_i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("save pdf");
    bytes
}

#[tokio::test]
async fn pdf_question_is_answered_from_the_matching_page() {
    let server = MockServer::start_async().await;
    let answer_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/completions")
                .body_contains("Helpful Answer:")
                .body_contains("PELICAN");
            then.status(200).json_body(json!({
                "choices": [{ "text": " The launch code is PELICAN seven. " }],
                "usage": { "prompt_tokens": 90, "completion_tokens": 8 }
            }));
        })
        .await;

    let dir = tempfile::tempdir().expect("tempdir");
    let store = local_store(&dir).await;
    let service = service(
        &server,
        settings(ReingestPolicy::Duplicate, LanguagePolicy::Forward),
    );

    let processed = service
        .ingest(&store, three_page_pdf(), Some("handbook.pdf".into()))
        .await
        .expect("ingest");
    assert_eq!(processed.format, DocumentFormat::Pdf);
    assert_eq!(processed.segment_count, 3);
    assert_eq!(processed.inserted, 3);
    assert_eq!(store.count().await.expect("count"), 3);

    let answer = service
        .ask(&store, "What is the launch code?")
        .await
        .expect("answer");

    answer_mock.assert_async().await;
    assert_eq!(answer.answer, "The launch code is PELICAN seven.");
    assert_eq!(answer.sources.len(), 3);
    assert!(answer.sources[0].chunk.text.contains("PELICAN"));
    assert_eq!(answer.sources[0].source.as_deref(), Some("handbook.pdf"));

    let metrics = service.metrics_snapshot();
    assert_eq!(metrics.documents_ingested, 1);
    assert_eq!(metrics.questions_answered, 1);
    assert_eq!(metrics.prompt_tokens, 90);
    // 90 prompt and 8 completion tokens at the instruct model's list price.
    assert!((metrics.estimated_cost_usd - 0.000_151).abs() < 1e-12);
}

#[tokio::test]
async fn records_survive_reopening_the_store() {
    let server = MockServer::start_async().await;
    let dir = tempfile::tempdir().expect("tempdir");
    let service = service(
        &server,
        settings(ReingestPolicy::Duplicate, LanguagePolicy::Forward),
    );

    {
        let store = local_store(&dir).await;
        service
            .ingest(&store, b"Quarterly revenue grew".to_vec(), Some("q3.txt".into()))
            .await
            .expect("ingest");
    }

    let reopened = local_store(&dir).await;
    let hits = service
        .retrieve(&reopened, "revenue", 3)
        .await
        .expect("retrieve");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].chunk.text, "Quarterly revenue grew");
}

#[tokio::test]
async fn reingest_policies_control_stored_records() {
    let server = MockServer::start_async().await;
    let bytes = b"The same document twice".to_vec();

    let duplicate_dir = tempfile::tempdir().expect("tempdir");
    let duplicate_store = local_store(&duplicate_dir).await;
    let duplicate = service(
        &server,
        settings(ReingestPolicy::Duplicate, LanguagePolicy::Forward),
    );
    for _ in 0..2 {
        duplicate
            .ingest(&duplicate_store, bytes.clone(), Some("same.txt".into()))
            .await
            .expect("ingest");
    }
    assert_eq!(duplicate_store.count().await.expect("count"), 2);

    let skip_dir = tempfile::tempdir().expect("tempdir");
    let skip_store = local_store(&skip_dir).await;
    let skip = service(
        &server,
        settings(ReingestPolicy::Skip, LanguagePolicy::Forward),
    );
    skip.ingest(&skip_store, bytes.clone(), Some("same.txt".into()))
        .await
        .expect("first ingest");
    let second = skip
        .ingest(&skip_store, bytes.clone(), Some("same.txt".into()))
        .await
        .expect("second ingest");
    assert_eq!(second.inserted, 0);
    assert_eq!(second.skipped_duplicates, 1);
    assert_eq!(skip_store.count().await.expect("count"), 1);

    let replace_dir = tempfile::tempdir().expect("tempdir");
    let replace_store = local_store(&replace_dir).await;
    let replace = service(
        &server,
        settings(ReingestPolicy::Replace, LanguagePolicy::Forward),
    );
    replace
        .ingest(&replace_store, bytes.clone(), Some("same.txt".into()))
        .await
        .expect("first ingest");
    let second = replace
        .ingest(&replace_store, bytes, Some("same.txt".into()))
        .await
        .expect("second ingest");
    assert_eq!(second.replaced, 1);
    assert_eq!(second.inserted, 1);
    assert_eq!(replace_store.count().await.expect("count"), 1);
}

#[tokio::test]
async fn unsupported_upload_leaves_store_untouched() {
    let server = MockServer::start_async().await;
    let dir = tempfile::tempdir().expect("tempdir");
    let store = local_store(&dir).await;
    let service = service(
        &server,
        settings(ReingestPolicy::Duplicate, LanguagePolicy::Forward),
    );

    let error = service
        .ingest(&store, b"a,b,c".to_vec(), Some("table.xlsx".into()))
        .await
        .expect_err("xlsx is unsupported");
    assert!(matches!(
        error,
        ProcessingError::Loader(LoaderError::UnsupportedFormat(ref ext)) if ext == ".xlsx"
    ));
    assert_eq!(store.count().await.expect("count"), 0);
}

#[tokio::test]
async fn translation_uses_the_chat_model() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/chat/completions")
                .body_matches(Regex::new(r"into fr\b").expect("regex"))
                .body_contains("\"model\":\"gpt-3.5-turbo\"");
            then.status(200).json_body(json!({
                "choices": [{ "message": { "role": "assistant", "content": "Bonjour\n" } }]
            }));
        })
        .await;

    let service = service(
        &server,
        settings(ReingestPolicy::Duplicate, LanguagePolicy::Forward),
    );
    let translation = service.translate("Hello", " FR ").await.expect("translate");

    mock.assert_async().await;
    assert_eq!(translation.translation, "Bonjour");
    assert_eq!(translation.target_lang, "fr");
}

#[tokio::test]
async fn strict_policy_rejects_unknown_language_without_calling_the_model() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST);
            then.status(500);
        })
        .await;

    let service = service(
        &server,
        settings(ReingestPolicy::Duplicate, LanguagePolicy::Strict),
    );
    let error = service
        .translate("Hello", "xx")
        .await
        .expect_err("strict policy");

    assert!(matches!(error, TranslateError::UnsupportedLanguage(ref code) if code == "xx"));
    mock.assert_hits_async(0).await;
}

#[tokio::test]
async fn summary_of_blank_text_is_empty() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST);
            then.status(500);
        })
        .await;

    let service = service(
        &server,
        settings(ReingestPolicy::Duplicate, LanguagePolicy::Forward),
    );
    let summary = service.summarize("  \n ").await.expect("summary");

    assert_eq!(summary, "");
    mock.assert_hits_async(0).await;
}

#[tokio::test]
async fn short_text_summary_maps_then_reduces() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/completions")
                .body_contains("CONCISE SUMMARY:");
            then.status(200).json_body(json!({
                "choices": [{ "text": " Revenue grew. " }]
            }));
        })
        .await;

    let service = service(
        &server,
        settings(ReingestPolicy::Duplicate, LanguagePolicy::Forward),
    );
    let summary = service
        .summarize("Quarterly revenue grew by ten percent on strong demand.")
        .await
        .expect("summary");

    assert_eq!(summary, "Revenue grew.");
    mock.assert_hits_async(2).await;
    assert_eq!(service.metrics_snapshot().summaries_generated, 1);
}
