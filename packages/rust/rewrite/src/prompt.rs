//! Prompt construction for the rewrite call.

use blogrefresh_shared::{ReferenceArticle, RewriteFormat};

/// References beyond this count are left out of the prompt.
pub const MAX_PROMPT_REFERENCES: usize = 5;

/// A system/user prompt pair handed to a [`crate::TextGenerator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    /// System and user text in one block, for providers without a system role.
    pub fn combined(&self) -> String {
        format!("{}\n\n{}", self.system, self.user)
    }
}

/// Build the rewrite prompt for an original article and its references.
pub fn build_prompt(
    title: &str,
    content: &str,
    references: &[ReferenceArticle],
    format: RewriteFormat,
) -> Prompt {
    let format_name = format.as_str().to_uppercase();

    let mut user = format!("ORIGINAL\nTITLE: {title}\nCONTENT:\n{content}\n\n");

    let blocks: Vec<String> = references
        .iter()
        .take(MAX_PROMPT_REFERENCES)
        .enumerate()
        .map(|(idx, r)| format!("REFERENCE {}\n{}", idx + 1, reference_block(r)))
        .collect();
    if !blocks.is_empty() {
        user.push_str(&blocks.join("\n\n"));
        user.push_str("\n\n");
    }

    user.push_str(&format!("OUTPUT FORMAT: {format_name}\n"));
    user.push_str(format_instruction(format));

    Prompt {
        system: system_instructions(format),
        user,
    }
}

/// Editor instructions shared by every provider.
pub fn system_instructions(format: RewriteFormat) -> String {
    [
        "You are an expert editor and writer.".to_string(),
        format!(
            "Rewrite the provided ORIGINAL article into high-quality {} with clear headings and improved structure.",
            format.as_str().to_uppercase()
        ),
        "Use the REFERENCE articles only to match tone, depth, and stylistic patterns.".to_string(),
        "DO NOT plagiarize: do not copy sentences or distinctive phrasing from the references."
            .to_string(),
        "DO NOT invent citations, quotes, or factual claims not supported by the ORIGINAL content."
            .to_string(),
        "Keep the topic the same as the ORIGINAL article, but improve clarity, flow, and usefulness."
            .to_string(),
        "Output ONLY the rewritten content (no preface, no explanation).".to_string(),
    ]
    .join(" ")
}

fn format_instruction(format: RewriteFormat) -> &'static str {
    match format {
        RewriteFormat::Html => {
            "Return valid HTML. Use semantic headings (<h2>, <h3>), paragraphs, and lists. Do not include <html>, <head>, or <body> wrappers."
        }
        RewriteFormat::Markdown => {
            "Return Markdown. Use headings (##, ###), paragraphs, and bullet lists."
        }
    }
}

fn reference_block(reference: &ReferenceArticle) -> String {
    let title = reference.title.trim();
    let content = reference.content.trim();
    format!(
        "TITLE: {}\nCONTENT:\n{}",
        if title.is_empty() { "(untitled)" } else { title },
        if content.is_empty() { "(empty)" } else { content },
    )
}
