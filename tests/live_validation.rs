use docusmart::{
    config::Config,
    embedding::{EmbeddingClient, embedding_client_for},
    generation::{CompletionRequest, GenerationClient, generation_client_for},
    processing::{DocumentService, Workspace},
    store::{StoreLocation, open_store},
};

fn live_config() -> Config {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("configuration from environment");
    config.validate().expect("configuration must be valid");
    config
}

#[tokio::test]
#[ignore = "Requires a live embedding provider"]
async fn live_embedding_roundtrip() {
    let config = live_config();
    let client = embedding_client_for(&config).expect("embedding client");
    let vectors = client
        .generate_embeddings(vec!["docusmart live embedding".to_string()])
        .await
        .expect("failed to request embeddings from provider");
    assert_eq!(vectors.len(), 1, "expected embedding per input chunk");
    assert_eq!(
        vectors[0].len(),
        config.embedding_dimension,
        "embedding dimension mismatch"
    );
}

#[tokio::test]
#[ignore = "Requires a live generation provider"]
async fn live_generation_returns_text() {
    let config = live_config();
    let client = generation_client_for(&config).expect("generation client");
    let completion = client
        .complete(CompletionRequest::deterministic(
            config.generation_model.clone(),
            "Reply with the single word: ready",
        ))
        .await
        .expect("completion");
    assert!(!completion.text.trim().is_empty());
}

#[tokio::test]
#[ignore = "Requires the configured vector store"]
async fn live_store_health_snapshot() {
    let config = live_config();
    let location = StoreLocation::from_config(&config).expect("store location");
    let store = open_store(&location).await.expect("open store");
    let service = DocumentService::from_config(&config).expect("service");
    let workspace = Workspace::new(service, store);

    let snapshot = workspace.service().health(workspace.store()).await;
    assert!(
        snapshot.reachable,
        "vector store should be reachable: {snapshot:?}"
    );
}
