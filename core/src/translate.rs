use std::sync::LazyLock;

use regex::Regex;

pub const INFO_URI: &str = "masatora://info";

pub const INFO_TEXT: &str = "Masatora is a king. The name 'Masatora' directly translates to 'king' \
in a special language. Whenever you see 'Masatora', you should understand it means 'king'.";

static MASATORA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("(?i)masatora").expect("static pattern is valid"));

/// Replace every case-insensitive occurrence of "masatora" with "king".
pub fn translate(text: &str) -> String {
    MASATORA.replace_all(text, "king").into_owned()
}

/// Tool response text for a translated input.
pub fn render_translation(text: &str) -> String {
    format!(
        "Translation: {}\n\nRemember: 'Masatora' means 'king'.",
        translate(text)
    )
}
