// src/supervisor/ansi.rs

//! ANSI SGR → HTML conversion for engine output.
//!
//! The engine always runs with `--color`, so its stdout/stderr carry SGR
//! escape sequences. [`AnsiConverter`] feeds the bytes through a `vte`
//! parser and renders printable text as HTML-escaped text wrapped in
//! `<span style="...">` elements. Parser state survives between calls, so a
//! sequence split across two reads is still recognised.
//!
//! Everything other than SGR (cursor movement, OSC titles, DCS) is dropped.
//! Invalid UTF-8 comes out as U+FFFD.

use std::fmt::Write as _;

use vte::{Params, Parser, Perform};

/// Foreground used by [`AnsiConverter::default`].
pub const DEFAULT_FOREGROUND: &str = "#ffffff";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Style {
    fg: Option<String>,
    bg: Option<String>,
    bold: bool,
    italic: bool,
    underline: bool,
}

impl Style {
    fn is_plain(&self) -> bool {
        *self == Style::default()
    }

    fn css(&self, default_fg: &str) -> String {
        let mut css = String::new();
        let _ = write!(css, "color:{}", self.fg.as_deref().unwrap_or(default_fg));
        if let Some(bg) = &self.bg {
            let _ = write!(css, ";background-color:{bg}");
        }
        if self.bold {
            css.push_str(";font-weight:bold");
        }
        if self.italic {
            css.push_str(";font-style:italic");
        }
        if self.underline {
            css.push_str(";text-decoration:underline");
        }
        css
    }
}

struct HtmlWriter {
    default_fg: String,
    style: Style,
    /// Style of the currently open `<span>`, if any.
    open: Option<Style>,
    out: String,
}

impl HtmlWriter {
    fn push_char(&mut self, c: char) {
        if self.open.as_ref() != Some(&self.style) {
            self.close_span();
            if !self.style.is_plain() {
                let _ = write!(self.out, "<span style=\"{}\">", self.style.css(&self.default_fg));
                self.open = Some(self.style.clone());
            }
        }
        match c {
            '&' => self.out.push_str("&amp;"),
            '<' => self.out.push_str("&lt;"),
            '>' => self.out.push_str("&gt;"),
            '"' => self.out.push_str("&quot;"),
            '\'' => self.out.push_str("&#x27;"),
            c => self.out.push(c),
        }
    }

    fn close_span(&mut self) {
        if self.open.take().is_some() {
            self.out.push_str("</span>");
        }
    }

    fn apply_sgr(&mut self, codes: &[u16]) {
        if codes.is_empty() {
            self.style = Style::default();
            return;
        }

        let mut i = 0;
        while i < codes.len() {
            match codes[i] {
                0 => self.style = Style::default(),
                1 => self.style.bold = true,
                3 => self.style.italic = true,
                4 => self.style.underline = true,
                22 => self.style.bold = false,
                23 => self.style.italic = false,
                24 => self.style.underline = false,
                n @ 30..=37 => self.style.fg = Some(palette(n - 30)),
                39 => self.style.fg = None,
                n @ 40..=47 => self.style.bg = Some(palette(n - 40)),
                49 => self.style.bg = None,
                n @ 90..=97 => self.style.fg = Some(palette(n - 90 + 8)),
                n @ 100..=107 => self.style.bg = Some(palette(n - 100 + 8)),
                n @ (38 | 48) => {
                    let (color, used) = extended_color(&codes[i + 1..]);
                    i += used;
                    if let Some(color) = color {
                        if n == 38 {
                            self.style.fg = Some(color);
                        } else {
                            self.style.bg = Some(color);
                        }
                    }
                }
                _ => {}
            }
            i += 1;
        }
    }
}

impl Perform for HtmlWriter {
    fn print(&mut self, c: char) {
        self.push_char(c);
    }

    fn execute(&mut self, byte: u8) {
        match byte {
            b'\n' => self.push_char('\n'),
            b'\t' => self.push_char('\t'),
            _ => {}
        }
    }

    fn csi_dispatch(&mut self, params: &Params, intermediates: &[u8], ignore: bool, action: char) {
        if action != 'm' || ignore || !intermediates.is_empty() {
            return;
        }
        // `38;5;n` arrives as separate params, `38:5:n` as sub-params of one;
        // flattening handles both.
        let codes: Vec<u16> = params.iter().flat_map(|p| p.iter().copied()).collect();
        self.apply_sgr(&codes);
    }
}

/// `38;5;n` / `38;2;r;g;b` tail parser. Returns the color and how many
/// codes after the introducer were consumed.
fn extended_color(rest: &[u16]) -> (Option<String>, usize) {
    match rest {
        [5, n, ..] => (u8::try_from(*n).ok().map(xterm_256), 2),
        [2, r, g, b, ..] => {
            let c = |v: u16| u8::try_from(v).unwrap_or(u8::MAX);
            (Some(hex(c(*r), c(*g), c(*b))), 4)
        }
        [5] | [2, ..] => (None, rest.len()),
        _ => (None, 0),
    }
}

fn hex(r: u8, g: u8, b: u8) -> String {
    format!("#{r:02x}{g:02x}{b:02x}")
}

/// The 16 base colors.
fn palette(index: u16) -> String {
    const BASE: [(u8, u8, u8); 16] = [
        (0x00, 0x00, 0x00),
        (0xaa, 0x00, 0x00),
        (0x00, 0xaa, 0x00),
        (0xaa, 0x55, 0x00),
        (0x00, 0x00, 0xaa),
        (0xaa, 0x00, 0xaa),
        (0x00, 0xaa, 0xaa),
        (0xaa, 0xaa, 0xaa),
        (0x55, 0x55, 0x55),
        (0xff, 0x55, 0x55),
        (0x55, 0xff, 0x55),
        (0xff, 0xff, 0x55),
        (0x55, 0x55, 0xff),
        (0xff, 0x55, 0xff),
        (0x55, 0xff, 0xff),
        (0xff, 0xff, 0xff),
    ];
    let (r, g, b) = BASE[usize::from(index) % BASE.len()];
    hex(r, g, b)
}

fn xterm_256(n: u8) -> String {
    match n {
        0..=15 => palette(u16::from(n)),
        16..=231 => {
            let level = |v: u8| if v == 0 { 0 } else { 55 + v * 40 };
            let i = n - 16;
            hex(level(i / 36), level((i / 6) % 6), level(i % 6))
        }
        _ => {
            let gray = 8 + (n - 232) * 10;
            hex(gray, gray, gray)
        }
    }
}

/// Streaming converter from ANSI-colored bytes to HTML.
pub struct AnsiConverter {
    parser: Parser,
    writer: HtmlWriter,
}

impl std::fmt::Debug for AnsiConverter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnsiConverter")
            .field("default_fg", &self.writer.default_fg)
            .field("style", &self.writer.style)
            .finish_non_exhaustive()
    }
}

impl Default for AnsiConverter {
    fn default() -> Self {
        Self::new(DEFAULT_FOREGROUND)
    }
}

impl AnsiConverter {
    /// `default_fg` is any CSS color; it is used for styled text that has
    /// no explicit foreground (bold, underline, a background only).
    pub fn new(default_fg: impl Into<String>) -> Self {
        Self {
            parser: Parser::new(),
            writer: HtmlWriter {
                default_fg: default_fg.into(),
                style: Style::default(),
                open: None,
                out: String::new(),
            },
        }
    }

    pub fn default_fg(&self) -> &str {
        &self.writer.default_fg
    }

    /// Change the default foreground for subsequent output.
    pub fn set_default_fg(&mut self, default_fg: impl Into<String>) {
        self.writer.default_fg = default_fg.into();
    }

    /// Convert one chunk. Open spans are closed at the end of every chunk
    /// so each returned string is well-formed on its own; the active style
    /// carries over to the next chunk.
    pub fn convert(&mut self, bytes: &[u8]) -> String {
        for byte in bytes {
            self.parser.advance(&mut self.writer, *byte);
        }
        self.writer.close_span();
        std::mem::take(&mut self.writer.out)
    }

    /// Drop any carried-over style and partial escape sequence.
    pub fn reset(&mut self) {
        self.parser = Parser::new();
        self.writer.style = Style::default();
        self.writer.open = None;
        self.writer.out.clear();
    }
}

/// HTML-escape plain text (used for supervisor diagnostics).
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            c => out.push(c),
        }
    }
    out
}
