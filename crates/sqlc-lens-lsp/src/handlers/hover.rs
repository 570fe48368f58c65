//! Hover handler for previewing the query behind a generated function.
//!
//! The hover shows a link that runs [`GO_TO_SQL_QUERY`], a divider and the
//! query text as a fenced SQL block.

use lsp_types::{Hover, HoverContents, HoverParams, MarkupContent, MarkupKind};
use sqlc_lens_core::{ParsedSource, QueryLocator};
use std::path::Path;

use super::execute_command::{GoToQueryArgs, GO_TO_SQL_QUERY};
use super::utils::{word_at_position, LineIndex};

/// Handle a hover request.
pub fn handle_hover(
    params: &HoverParams,
    source: &str,
    path: &Path,
    parsed: &ParsedSource,
    locator: &QueryLocator,
) -> Option<Hover> {
    let index = LineIndex::new(source);
    let (word, span) = word_at_position(&index, params.text_document_position_params.position)?;

    tracing::debug!("Hover for word: {:?}", word);

    let value = match locator.locate_for_symbol(path, parsed, word) {
        Some(found) => {
            let args = GoToQueryArgs::new(&found.definition_file, found.offset);
            format!(
                "{}\n\n---\n\n{}",
                command_link("Go to SQL definition", &args),
                sql_code_block(&found.query_text)
            )
        }
        None if locator.settings().hover_fallback_to_generated => {
            sql_code_block(&locator.generated_query_for_symbol(path, parsed, word)?)
        }
        None => return None,
    };

    Some(Hover {
        contents: HoverContents::Markup(MarkupContent {
            kind: MarkupKind::Markdown,
            value,
        }),
        range: Some(index.span_to_range(span)),
    })
}

/// Markdown link that runs the jump command when clicked.
fn command_link(title: &str, args: &GoToQueryArgs) -> String {
    let json = args.to_value().to_string();
    format!(
        "[{title}](command:{GO_TO_SQL_QUERY}?{})",
        urlencoding::encode(&json)
    )
}

fn sql_code_block(query: &str) -> String {
    let fence = if query.contains("```") { "~~~~" } else { "```" };
    format!("{fence}sql\n{}\n{fence}", query.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_link_is_percent_encoded() {
        let args = GoToQueryArgs::new(Path::new("/w/db/queries/user.sql"), 38);
        let link = command_link("Go to SQL definition", &args);
        let encoded = link
            .strip_prefix("[Go to SQL definition](command:sqlcLens.goToSqlQuery?")
            .and_then(|rest| rest.strip_suffix(')'))
            .expect("link should wrap the command URI");
        assert!(!encoded.contains('"'));
        assert!(!encoded.contains(' '));
        assert!(!encoded.contains(')'));

        let decoded = urlencoding::decode(encoded).unwrap();
        let back: GoToQueryArgs = serde_json::from_str(&decoded).unwrap();
        assert_eq!(back, args);
    }

    #[test]
    fn test_sql_code_block() {
        assert_eq!(
            sql_code_block("-- name: GetUser\nSELECT 1;\n\n"),
            "```sql\n-- name: GetUser\nSELECT 1;\n```"
        );
        assert!(sql_code_block("SELECT '```';").starts_with("~~~~sql\n"));
    }
}
