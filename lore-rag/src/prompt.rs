//! Prompt assembly for entity extraction.

use crate::document::ScoredNode;

const CONTEXT_DIVIDER: &str = "---------------------";

/// The output contract appended to every extraction prompt.
pub const ENTITY_LIST_INSTRUCTION: &str = "Respond only with a JSON array. Each element must be an \
object with the string fields \"name\", \"description\" and \"personality\". Do not wrap the \
array in any other text.";

/// Build the extraction prompt.
///
/// Retrieved chunks appear in the order given (most similar first),
/// separated by blank lines, followed by the query and the output contract.
pub fn build_prompt(query: &str, retrieved: &[ScoredNode]) -> String {
    let context =
        retrieved.iter().map(|r| r.node.chunk.text.trim()).collect::<Vec<_>>().join("\n\n");

    format!(
        "Context information is below.\n\
         {CONTEXT_DIVIDER}\n\
         {context}\n\
         {CONTEXT_DIVIDER}\n\
         Given the context information and not prior knowledge, answer the query.\n\
         Query: {query}\n\
         {ENTITY_LIST_INSTRUCTION}\n\
         Answer:"
    )
}
