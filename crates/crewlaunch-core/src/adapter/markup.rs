//! Rendering of highlight markup (`:color[text]`) for concrete surfaces.

use std::sync::OnceLock;

use crossterm::style::{Color as TermColor, Stylize, style};
use regex::{Captures, Regex};

use super::Color;

fn span_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r":(red|green|blue|orange)\[([^\]]*)\]").expect("valid markup regex")
    })
}

/// Escape the characters that are significant in HTML text and attributes.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// Convert markup to HTML. Text is escaped; highlight spans become
/// `<span class="hl hl-<color>">`. Newlines are kept as-is and rely on
/// `white-space: pre-wrap` in the page.
pub fn to_html(markup: &str) -> String {
    let escaped = escape_html(markup);
    span_re()
        .replace_all(&escaped, |caps: &Captures<'_>| {
            format!(r#"<span class="hl hl-{}">{}</span>"#, &caps[1], &caps[2])
        })
        .into_owned()
}

fn term_color(color: Color) -> TermColor {
    match color {
        Color::Red => TermColor::Red,
        Color::Green => TermColor::Green,
        Color::Blue => TermColor::Blue,
        Color::Orange => TermColor::Rgb {
            r: 255,
            g: 165,
            b: 0,
        },
    }
}

/// Convert markup to ANSI-coloured terminal text.
pub fn to_ansi(markup: &str) -> String {
    span_re()
        .replace_all(markup, |caps: &Captures<'_>| match Color::from_token(&caps[1]) {
            Some(color) => style(caps[2].to_string())
                .with(term_color(color))
                .bold()
                .to_string(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Drop highlight markup, keeping the wrapped text.
pub fn to_plain(markup: &str) -> String {
    span_re().replace_all(markup, "$2").into_owned()
}
