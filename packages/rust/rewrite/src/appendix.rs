//! The References section appended to every rewrite.

use blogrefresh_shared::{ReferenceArticle, RewriteFormat};

/// Render the References section, or an empty string when no reference
/// has a URL.
pub fn references_appendix(references: &[ReferenceArticle], format: RewriteFormat) -> String {
    let links: Vec<(&str, &str)> = references
        .iter()
        .filter_map(|r| {
            let url = r.url.trim();
            if url.is_empty() {
                return None;
            }
            let title = r.title.trim();
            Some((if title.is_empty() { "Reference" } else { title }, url))
        })
        .collect();

    if links.is_empty() {
        return String::new();
    }

    match format {
        RewriteFormat::Markdown => {
            let items: Vec<String> = links
                .iter()
                .map(|(title, url)| {
                    format!("- [{}]({})", title.replace(']', "\\]"), url.replace(')', "%29"))
                })
                .collect();
            format!("\n\n## References\n{}", items.join("\n"))
        }
        RewriteFormat::Html => {
            let items: String = links
                .iter()
                .map(|(title, url)| {
                    format!(
                        r#"<li><a href="{}" target="_blank" rel="noopener noreferrer">{}</a></li>"#,
                        html_escape::encode_double_quoted_attribute(url),
                        html_escape::encode_double_quoted_attribute(title),
                    )
                })
                .collect();
            format!("\n\n<h2>References</h2>\n<ul>{items}</ul>")
        }
    }
}
