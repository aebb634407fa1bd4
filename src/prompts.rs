//! Prompts sent to the transformation service.
//!
//! The tag names used here must match [`crate::markup`] exactly; the
//! assembler only recognises what these prompts ask for. Callers can replace
//! the chunk prompt through [`crate::config::ExtractionConfig::system_prompt`].

use crate::markup::{
    TagVocabulary, DOCUMENT_END, DOCUMENT_START, INTENSE_QUOTE_TAG, QUOTE_TAG,
};
use crate::pipeline::tables::TableMode;

pub const SUMMARY_START: &str = "SUMMARY START";
pub const SUMMARY_END: &str = "SUMMARY END";

/// Heading section of the chunk prompt for the base vocabulary.
const BASE_HEADING_RULES: &str = r#"1. Identify main headings, subheadings, and side headings. Use the following format:
   MAIN HEADING: text
   SUBHEADING: text
   SIDE HEADING: text"#;

/// Heading section of the chunk prompt for the extended vocabulary.
const EXTENDED_HEADING_RULES: &str = r#"1. Identify the heading hierarchy of the document, up to five levels. Use the following format:
   MAIN HEADING: text
   SUBHEADING: text
   SIDE HEADING: text
   MINOR HEADING: text
   SUB-MINOR HEADING: text"#;

const BODY_RULES: &str = r#"2. Extract and format normal text paragraphs completely. Ensure no sentences or words are left incomplete.

3. Identify any listed data or enumerated information and preserve its format. Do not add additional bullet points or enumeration if they already exist."#;

const INLINE_TABLE_RULES: &str = r#"4. Detect any tabular data structures within the text. For each detected table:
   - If the data is already in a bullet point or list format, preserve that format exactly.
   - Convert each row of the table into a bullet point
   - Start each bullet point with the first column's value
   - Include all values from all columns in the bullet point
   - Ensure that the relationship between all columns is clearly expressed
   - Do not omit any data for brevity
   For example, if a table has columns "Name", "Age", "Occupation", and "Salary", a row might be converted to:
   • John Doe, aged 30, works as a software engineer and earns $75,000 annually."#;

const EXTRACTED_TABLE_RULES: &str = r#"4. Tables have already been removed from this text and are handled separately. Do not invent tables or bullet points for tabular data."#;

const CLOSING_RULES: &str = r#"5. Maintain the original order and context of the document while processing.

6. Do not use any special characters or symbols for formatting except for the bullet points (•).

7. It is crucial that you process and include ALL content from the given chunk. Do not truncate or omit any information.

Your goal is to extract and transform the document content completely, preserving all original information and structure."#;

/// Build the chunk system prompt for the selected vocabulary and table mode.
pub fn chunk_system_prompt(vocabulary: TagVocabulary, table_mode: TableMode) -> String {
    let headings = match vocabulary {
        TagVocabulary::Base => BASE_HEADING_RULES,
        TagVocabulary::Extended => EXTENDED_HEADING_RULES,
    };
    let tables = match table_mode {
        TableMode::Inline => INLINE_TABLE_RULES,
        TableMode::Bullets | TableMode::Quotes => EXTRACTED_TABLE_RULES,
    };

    let mut prompt = String::from(
        "You are an advanced AI assistant specialized in processing text extracted from documents. Your tasks are:\n\n",
    );
    prompt.push_str(headings);
    prompt.push_str("\n\n");
    prompt.push_str(BODY_RULES);
    prompt.push_str("\n\n");
    prompt.push_str(tables);
    prompt.push_str("\n\n");
    if vocabulary == TagVocabulary::Extended {
        prompt.push_str(&format!(
            "Quoted passages may be marked with '{QUOTE_TAG} text' and emphasised call-outs with '{INTENSE_QUOTE_TAG} text'.\n\n"
        ));
    }
    prompt.push_str(CLOSING_RULES);
    prompt.push_str(&format!(
        "\n\nIf this is the first chunk of the document, start with '{DOCUMENT_START}'. If it's the last chunk, end with '{DOCUMENT_END}'."
    ));
    prompt
}

/// User message for one chunk, carrying its position in the document.
pub fn chunk_user_message(chunk: &str, is_first: bool, is_last: bool) -> String {
    let mut position = String::new();
    if is_first {
        position.push_str(" This is the first chunk of the document.");
    }
    if is_last {
        position.push_str(" This is the last chunk of the document.");
    }
    format!(
        "Process the following text chunk from a document, following the instructions given.{}\n\n{}",
        position, chunk
    )
}

/// System prompt for the summary pass.
pub fn summary_system_prompt(document_name: &str) -> String {
    format!(
        r#"You are an AI assistant specialized in creating concise and easily understandable summaries. Your task is to create a brief summary of the given text from the file "{document_name}". The summary should:

1. Start with a generic introductory sentence about the document.
2. Capture the main ideas and key points of the document in a concise manner.
3. Highlight only the most significant findings or conclusions.
4. Mention only the most important data or statistics, if present.
5. Be written in simple, clear language that is easy for a general audience to understand.
6. Be no longer than 300 words, including the introductory and concluding sentences.
7. Use bullet points for clarity where appropriate.
8. End with a generic concluding sentence about the document's overall significance or relevance.
9. Identify 5-7 keywords from the document and mark them with asterisks (*keyword*).

Your goal is to provide a summary that gives readers a quick overview of the document's core content, making it distinctly different from the full processed text.

Format the summary exactly as follows:
{SUMMARY_START}
[Introductory sentence]

[Main summary content with keywords marked]

[Concluding sentence]
{SUMMARY_END}"#
    )
}

/// User message for the summary pass.
pub fn summary_user_message(processed_text: &str) -> String {
    format!(
        "Create a concise and easy-to-understand summary of the following processed text:\n\n{}",
        processed_text
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_prompt_names_three_heading_tags() {
        let p = chunk_system_prompt(TagVocabulary::Base, TableMode::Inline);
        assert!(p.contains("MAIN HEADING: text"));
        assert!(p.contains("SIDE HEADING: text"));
        assert!(!p.contains("MINOR HEADING"));
        assert!(!p.contains(QUOTE_TAG));
        assert!(p.contains(DOCUMENT_START) && p.contains(DOCUMENT_END));
    }

    #[test]
    fn extended_prompt_names_five_levels_and_quotes() {
        let p = chunk_system_prompt(TagVocabulary::Extended, TableMode::Quotes);
        assert!(p.contains("SUB-MINOR HEADING: text"));
        assert!(p.contains(INTENSE_QUOTE_TAG));
        assert!(p.contains("already been removed"));
    }

    #[test]
    fn user_message_flags_position() {
        let m = chunk_user_message("body", true, false);
        assert!(m.contains("first chunk"));
        assert!(!m.contains("last chunk"));
        assert!(m.ends_with("body"));
        let m = chunk_user_message("body", false, true);
        assert!(m.contains("last chunk"));
    }

    #[test]
    fn summary_prompt_mentions_document_and_markers() {
        let p = summary_system_prompt("annual-report");
        assert!(p.contains("\"annual-report\""));
        assert!(p.contains(SUMMARY_START));
        assert!(p.contains(SUMMARY_END));
    }
}
