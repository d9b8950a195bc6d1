//! Reading documents and node sets from disk or stdin.

use std::path::Path;

use anyhow::{Context, anyhow, bail};
use lore_rag::{ApiResponse, IndexPayload, NodeSet};
use tokio::io::AsyncReadExt;

const UTF8_BOM: &str = "\u{feff}";

/// Read a plain-text document from `path`, or stdin when `path` is `-`.
///
/// Only UTF-8 text is accepted. Files containing NUL bytes are treated as
/// binary and rejected.
pub async fn read_document(path: &Path) -> anyhow::Result<String> {
    let bytes = read_bytes(path).await?;
    decode_text(bytes).with_context(|| format!("cannot use {} as a document", path.display()))
}

/// Read a node set written by `lore index`.
///
/// Accepts the full `{"payload": {"nodesWithEmbedding": [...]}}` envelope or
/// a bare node array.
pub async fn read_nodes(path: &Path) -> anyhow::Result<NodeSet> {
    let bytes = read_bytes(path).await?;
    parse_nodes(&bytes).with_context(|| format!("cannot read node set from {}", path.display()))
}

async fn read_bytes(path: &Path) -> anyhow::Result<Vec<u8>> {
    if path.as_os_str() == "-" {
        let mut buf = Vec::new();
        tokio::io::stdin().read_to_end(&mut buf).await.context("failed to read stdin")?;
        return Ok(buf);
    }
    tokio::fs::read(path).await.with_context(|| format!("failed to read {}", path.display()))
}

fn decode_text(bytes: Vec<u8>) -> anyhow::Result<String> {
    if bytes.contains(&0) {
        bail!("input looks like a binary file; only plain text is supported");
    }
    let text = String::from_utf8(bytes).map_err(|e| {
        anyhow!(
            "input is not valid UTF-8 (first invalid byte at offset {})",
            e.utf8_error().valid_up_to()
        )
    })?;
    Ok(match text.strip_prefix(UTF8_BOM) {
        Some(rest) => rest.to_string(),
        None => text,
    })
}

fn parse_nodes(bytes: &[u8]) -> anyhow::Result<NodeSet> {
    if let Ok(envelope) = serde_json::from_slice::<ApiResponse<IndexPayload>>(bytes) {
        return match envelope {
            ApiResponse::Payload(payload) => Ok(payload.nodes_with_embedding),
            ApiResponse::Error(message) => Err(anyhow!("indexing had failed: {message}")),
        };
    }
    let nodes: NodeSet = serde_json::from_slice(bytes).context("not a node set or index envelope")?;
    nodes.validate_dimensions()?;
    Ok(nodes)
}
