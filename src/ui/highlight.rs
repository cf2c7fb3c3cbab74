use ratatui::style::{Color, Style};
use ratatui::text::Span;
use syntect::easy::HighlightLines;
use syntect::parsing::{SyntaxReference, SyntaxSet};

use crate::engine::runtime::HighlightRuntime;

/// Language id → syntect lookup token (a file extension syntect knows).
const TOKENS: &[(&str, &str)] = &[
    ("markdown", "md"),
    ("typescript", "ts"),
    ("javascript", "js"),
    ("json", "json"),
    ("css", "css"),
    ("scss", "scss"),
    ("less", "less"),
    ("html", "html"),
    ("python", "py"),
    ("rust", "rs"),
    ("go", "go"),
    ("java", "java"),
    ("c", "c"),
    ("cpp", "cpp"),
    ("ruby", "rb"),
    ("yaml", "yaml"),
    ("sql", "sql"),
    ("shell", "sh"),
    ("xml", "xml"),
    ("ini", "ini"),
];

pub fn syntax_for<'s>(syntax_set: &'s SyntaxSet, language: &str) -> &'s SyntaxReference {
    TOKENS
        .iter()
        .find(|(id, _)| *id == language)
        .and_then(|(_, token)| syntax_set.find_syntax_by_token(token))
        .unwrap_or_else(|| syntax_set.find_syntax_plain_text())
}

/// Highlights one buffer top to bottom; parse state carries across lines, so
/// lines must be fed in order.
pub struct Highlighter<'r> {
    runtime: &'r HighlightRuntime,
    lines: HighlightLines<'r>,
}

impl<'r> Highlighter<'r> {
    pub fn new(runtime: &'r HighlightRuntime, language: &str) -> Self {
        let syntax = syntax_for(runtime.syntax_set(), language);
        Highlighter {
            runtime,
            lines: HighlightLines::new(syntax, runtime.theme()),
        }
    }

    /// Highlight the next line, layering syntax colours over `base_style`
    /// so added-line backgrounds survive.
    pub fn line(&mut self, line: &str, base_style: Style) -> Vec<Span<'static>> {
        // syntect needs a trailing newline
        let input = format!("{}\n", line);
        match self.lines.highlight_line(&input, self.runtime.syntax_set()) {
            Ok(ranges) => ranges
                .into_iter()
                .map(|(syn_style, text)| {
                    let fg = Color::Rgb(
                        syn_style.foreground.r,
                        syn_style.foreground.g,
                        syn_style.foreground.b,
                    );
                    Span::styled(text.trim_end_matches('\n').to_string(), base_style.fg(fg))
                })
                .filter(|span| !span.content.is_empty())
                .collect(),
            Err(_) => vec![Span::styled(line.to_string(), base_style)],
        }
    }
}

/// Expand tabs to `tab_width` spaces.
pub fn expand_tabs(line: &str, tab_width: u8) -> String {
    if !line.contains('\t') {
        return line.to_string();
    }
    line.replace('\t', &" ".repeat(usize::from(tab_width.max(1))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_ids_resolve_to_syntaxes() {
        let runtime = HighlightRuntime::load("base16-ocean.dark").unwrap();
        let set = runtime.syntax_set();
        assert_eq!(syntax_for(set, "rust").name, "Rust");
        assert_eq!(syntax_for(set, "python").name, "Python");
        assert_eq!(syntax_for(set, "plaintext").name, "Plain Text");
        assert_eq!(syntax_for(set, "klingon").name, "Plain Text");
    }

    #[test]
    fn highlighted_line_keeps_its_text() {
        let runtime = HighlightRuntime::load("base16-ocean.dark").unwrap();
        let mut hl = Highlighter::new(&runtime, "rust");
        let spans = hl.line("fn main() {}", Style::default());
        let text: String = spans.iter().map(|s| s.content.as_ref()).collect();
        assert_eq!(text, "fn main() {}");
    }

    #[test]
    fn tabs_expand() {
        assert_eq!(expand_tabs("\tx", 2), "  x");
        assert_eq!(expand_tabs("x", 4), "x");
    }
}
