use syntect::{
    html::{ClassStyle, ClassedHTMLGenerator},
    parsing::{SyntaxReference, SyntaxSet},
    util::LinesWithEndings,
};
use tracing::debug;

use crate::application::render::types::RenderError;

/// Highlight `code` into class-annotated spans. A declared language that the
/// syntax set does not know, or that fails mid-highlight, falls back to
/// detection from the first line and finally to plain text.
pub(crate) fn highlight_code(
    language: Option<&str>,
    code: &str,
    syntax_set: &SyntaxSet,
    class_style: &ClassStyle,
) -> String {
    if let Some(syntax) = language.and_then(|lang| find_syntax(syntax_set, lang)) {
        match highlight_with(syntax, code, syntax_set, class_style) {
            Ok(html) => return html,
            Err(err) => {
                debug!(
                    target = "application::render::highlight",
                    language = language.unwrap_or_default(),
                    error = %err,
                    "Declared-language highlighting failed; falling back to detection"
                );
            }
        }
    }

    let detected = syntax_set
        .find_syntax_by_first_line(code)
        .unwrap_or_else(|| syntax_set.find_syntax_plain_text());

    highlight_with(detected, code, syntax_set, class_style)
        .unwrap_or_else(|_| ammonia::clean_text(code))
}

fn highlight_with(
    syntax: &SyntaxReference,
    code: &str,
    syntax_set: &SyntaxSet,
    class_style: &ClassStyle,
) -> Result<String, RenderError> {
    let mut code_with_newline = code.to_string();
    if !code_with_newline.ends_with('\n') {
        code_with_newline.push('\n');
    }

    let mut generator =
        ClassedHTMLGenerator::new_with_class_style(syntax, syntax_set, *class_style);

    for line in LinesWithEndings::from(code_with_newline.as_str()) {
        generator
            .parse_html_for_line_which_includes_newline(line)
            .map_err(|err| RenderError::Highlighting {
                language: syntax.name.clone(),
                message: err.to_string(),
            })?;
    }

    Ok(generator.finalize())
}

fn find_syntax<'a>(syntax_set: &'a SyntaxSet, token: &str) -> Option<&'a SyntaxReference> {
    let lowercase = token.to_ascii_lowercase();
    syntax_set
        .find_syntax_by_token(&lowercase)
        .or_else(|| syntax_set.find_syntax_by_name(&lowercase))
        .or_else(|| syntax_set.find_syntax_by_extension(&lowercase))
}
