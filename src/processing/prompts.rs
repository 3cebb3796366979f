//! Prompt templates for answering, summarizing, and translating.

use crate::store::ScoredChunk;

const QA_TEMPLATE: &str = "Use the following pieces of context to answer the question at the end. If you don't know the answer, just say that you don't know, don't try to make up an answer.\n\n{context}\n\nQuestion: {question}\nHelpful Answer:";

const SUMMARY_TEMPLATE: &str =
    "Write a concise summary of the following:\n\n\n\"{text}\"\n\n\nCONCISE SUMMARY:";

const TRANSLATION_TEMPLATE: &str =
    "You are a professional translator. Translate the following text into {lang}.\n\n{text}";

/// Join retrieved chunk texts into one context block, best hit first.
pub fn join_context(hits: &[ScoredChunk]) -> String {
    hits.iter()
        .map(|hit| hit.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// "Stuff" prompt placing every retrieved chunk ahead of the question.
pub fn question_prompt(context: &str, question: &str) -> String {
    fill(QA_TEMPLATE, &[("{context}", context), ("{question}", question)])
}

/// Prompt used for both the map and the combine steps of summarization.
pub fn summary_prompt(text: &str) -> String {
    fill(SUMMARY_TEMPLATE, &[("{text}", text)])
}

/// Instructional translation prompt.
pub fn translation_prompt(text: &str, language: &str) -> String {
    fill(TRANSLATION_TEMPLATE, &[("{lang}", language), ("{text}", text)])
}

// Single pass so placeholder-looking text inside a value is left alone.
fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;
    while let Some((offset, key, value)) = values
        .iter()
        .filter_map(|(key, value)| rest.find(key).map(|offset| (offset, *key, *value)))
        .min_by_key(|(offset, _, _)| *offset)
    {
        output.push_str(&rest[..offset]);
        output.push_str(value);
        rest = &rest[offset + key.len()..];
    }
    output.push_str(rest);
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::{Chunk, compute_chunk_hash};

    fn hit(text: &str) -> ScoredChunk {
        ScoredChunk {
            record_id: "r".into(),
            document_id: "d".into(),
            source: None,
            score: 1.0,
            chunk: Chunk {
                index: 0,
                segment: 0,
                start: 0,
                end: text.len(),
                text: text.into(),
                chunk_hash: compute_chunk_hash(text),
            },
        }
    }

    #[test]
    fn question_prompt_matches_template() {
        let context = join_context(&[hit("First."), hit("Second.")]);
        assert_eq!(
            question_prompt(&context, "What?"),
            "Use the following pieces of context to answer the question at the end. If you don't know the answer, just say that you don't know, don't try to make up an answer.\n\nFirst.\n\nSecond.\n\nQuestion: What?\nHelpful Answer:"
        );
    }

    #[test]
    fn empty_context_still_builds_prompt() {
        let prompt = question_prompt(&join_context(&[]), "Anything?");
        assert!(prompt.contains("\n\n\n\nQuestion: Anything?"));
    }

    #[test]
    fn summary_prompt_quotes_text() {
        assert_eq!(
            summary_prompt("Body"),
            "Write a concise summary of the following:\n\n\n\"Body\"\n\n\nCONCISE SUMMARY:"
        );
    }

    #[test]
    fn translation_prompt_leaves_placeholders_in_text() {
        assert_eq!(
            translation_prompt("Say {lang} twice", "fr"),
            "You are a professional translator. Translate the following text into fr.\n\nSay {lang} twice"
        );
    }
}
