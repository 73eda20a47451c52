use courier_core::translate::{render_translation, translate};

#[test]
fn test_translate_replaces_every_case() {
    assert_eq!(
        translate("Masatora met MASATORA and masatora"),
        "king met king and king"
    );
}

#[test]
fn test_translate_inside_words() {
    assert_eq!(translate("masatoras"), "kings");
}

#[test]
fn test_translate_leaves_other_text_alone() {
    assert_eq!(translate("no royalty here"), "no royalty here");
    assert_eq!(translate(""), "");
}

#[test]
fn test_render_translation() {
    assert_eq!(
        render_translation("Hail Masatora!"),
        "Translation: Hail king!\n\nRemember: 'Masatora' means 'king'."
    );
}
