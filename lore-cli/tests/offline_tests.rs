//! Index → save → load → query through the CLI building blocks, offline.

use std::io::Write;

use lore_cli::{OFFLINE_DIMENSIONS, ProviderSettings, read_document, read_nodes, retry_policy};
use lore_rag::{
    ApiResponse, CancellationToken, IndexRequest, MalformedOutputPolicy, QueryRequest,
    retrieve_and_query, split_and_embed,
};

#[tokio::test]
async fn offline_index_output_feeds_query() {
    let dir = tempfile::tempdir().unwrap();
    let doc_path = dir.path().join("moby.txt");
    let mut file = std::fs::File::create(&doc_path).unwrap();
    let text: String = (0..120).map(|i| format!("word{i} ")).collect();
    file.write_all(text.as_bytes()).unwrap();

    let settings = ProviderSettings { offline: true, ..ProviderSettings::default() };
    let pipeline = settings.build_pipeline(retry_policy(1)).unwrap();
    let cancel = CancellationToken::new();

    let document = read_document(&doc_path).await.unwrap();
    let request = IndexRequest { document, chunk_size: 50, chunk_overlap: 10 };
    let indexed = split_and_embed(&pipeline, request, &cancel).await;

    let nodes_path = dir.path().join("nodes.json");
    std::fs::write(&nodes_path, serde_json::to_string_pretty(&indexed).unwrap()).unwrap();

    let nodes = read_nodes(&nodes_path).await.unwrap();
    assert_eq!(nodes.len(), 3);
    assert_eq!(nodes.dimensions(), Some(OFFLINE_DIMENSIONS));

    let answered =
        retrieve_and_query(&pipeline, QueryRequest::new(nodes), MalformedOutputPolicy::Strict, &cancel)
            .await;
    match answered {
        ApiResponse::Payload(payload) => assert!(payload.response.is_empty()),
        ApiResponse::Error(e) => panic!("query failed: {e}"),
    }
}

#[tokio::test]
async fn invalid_chunking_is_an_error_envelope() {
    let settings = ProviderSettings { offline: true, ..ProviderSettings::default() };
    let pipeline = settings.build_pipeline(retry_policy(1)).unwrap();

    let request = IndexRequest { document: "some text".into(), chunk_size: 5, chunk_overlap: 5 };
    let response = split_and_embed(&pipeline, request, &CancellationToken::new()).await;

    let json = serde_json::to_value(&response).unwrap();
    assert!(json["error"].as_str().unwrap().contains("Invalid configuration"));
    assert!(json.get("payload").is_none());
}
