// tests/ansi_conversion.rs

use watchcmd::supervisor::{AnsiConverter, escape_html};

#[test]
fn plain_text_passes_through() {
    let mut conv = AnsiConverter::default();
    assert_eq!(conv.convert(b"hello\nworld\n"), "hello\nworld\n");
}

#[test]
fn basic_colors_become_spans() {
    let mut conv = AnsiConverter::default();
    assert_eq!(
        conv.convert(b"\x1b[31mred\x1b[0m plain"),
        "<span style=\"color:#aa0000\">red</span> plain"
    );
    assert_eq!(
        conv.convert(b"\x1b[92mbright\x1b[39m default"),
        "<span style=\"color:#55ff55\">bright</span> default"
    );
}

#[test]
fn styles_without_foreground_use_the_default_color() {
    let mut conv = AnsiConverter::new("#123456");
    assert_eq!(
        conv.convert(b"\x1b[1mB\x1b[0m"),
        "<span style=\"color:#123456;font-weight:bold\">B</span>"
    );

    conv.set_default_fg("#abcdef");
    assert_eq!(
        conv.convert(b"\x1b[4mU\x1b[m"),
        "<span style=\"color:#abcdef;text-decoration:underline\">U</span>"
    );
}

#[test]
fn combined_and_background_attributes() {
    let mut conv = AnsiConverter::default();
    assert_eq!(
        conv.convert(b"\x1b[1;36;44mX\x1b[0m"),
        "<span style=\"color:#00aaaa;background-color:#0000aa;font-weight:bold\">X</span>"
    );
}

#[test]
fn extended_colors() {
    let mut conv = AnsiConverter::default();
    assert_eq!(
        conv.convert(b"\x1b[38;5;196mX\x1b[0m"),
        "<span style=\"color:#ff0000\">X</span>"
    );
    assert_eq!(
        conv.convert(b"\x1b[38;5;244mX\x1b[0m"),
        "<span style=\"color:#808080\">X</span>"
    );
    assert_eq!(
        conv.convert(b"\x1b[38;2;1;2;3mX\x1b[0m"),
        "<span style=\"color:#010203\">X</span>"
    );
}

#[test]
fn html_is_escaped() {
    let mut conv = AnsiConverter::default();
    assert_eq!(conv.convert(b"<b>&\"'"), "&lt;b&gt;&amp;&quot;&#x27;");
    assert_eq!(escape_html("a < b"), "a &lt; b");
}

#[test]
fn sequences_split_across_chunks_are_recognised() {
    let mut conv = AnsiConverter::default();
    assert_eq!(conv.convert(b"\x1b[3"), "");
    assert_eq!(
        conv.convert(b"2mgreen"),
        "<span style=\"color:#00aa00\">green</span>"
    );
    // Style carries over into the next chunk.
    assert_eq!(
        conv.convert(b" still\x1b[0m"),
        "<span style=\"color:#00aa00\"> still</span>"
    );
}

#[test]
fn non_sgr_sequences_are_dropped() {
    let mut conv = AnsiConverter::default();
    assert_eq!(conv.convert(b"\x1b[2J\x1b[Hhi\x1b]0;title\x07!"), "hi!");
}

#[test]
fn invalid_utf8_does_not_abort_conversion() {
    let mut conv = AnsiConverter::default();
    let html = conv.convert(b"a\xffb");
    assert!(html.starts_with('a'));
    assert!(html.contains('\u{FFFD}') || html.ends_with('b'));

    assert_eq!(conv.convert(b"next"), "next");
}

#[test]
fn reset_drops_carried_style() {
    let mut conv = AnsiConverter::default();
    conv.convert(b"\x1b[31m");
    conv.reset();
    assert_eq!(conv.convert(b"x"), "x");
}
