//! Text handler: plain text, Markdown and HTML.
//!
//! The conversions are deterministic regex rewrites, not full parsers. They
//! cover the constructs documents commonly use (headings, emphasis, inline
//! code, links, paragraphs) and drop anything else to plain text.
//!
//! ## Rule Order
//!
//! Markdown → HTML escapes `&`, `<`, `>` before any tag is emitted, and
//! renders inline code before emphasis so `*` inside backticks survives.
//! HTML → anything decodes entities last, after all tags are gone.

use crate::error::HandlerError;
use crate::format::{FileRecord, FormatDescriptor};
use crate::handler::FormatHandler;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

pub struct TextHandler;

impl TextHandler {
    pub const NAME: &'static str = "text";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Plain,
    Markdown,
    Html,
}

fn kind(desc: &FormatDescriptor) -> Option<Kind> {
    match desc.format.as_str() {
        "txt" => Some(Kind::Plain),
        "md" => Some(Kind::Markdown),
        "html" => Some(Kind::Html),
        _ => None,
    }
}

#[async_trait]
impl FormatHandler for TextHandler {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn init(&self) -> Result<Vec<FormatDescriptor>, HandlerError> {
        Ok(vec![
            FormatDescriptor::new("Plain Text", "txt", "txt", "text/plain")
                .readable()
                .writable(),
            FormatDescriptor::new("Markdown", "md", "md", "text/markdown")
                .readable()
                .writable(),
            FormatDescriptor::new("HyperText Markup Language", "html", "html", "text/html")
                .readable()
                .writable(),
        ])
    }

    async fn convert(
        &self,
        files: Vec<FileRecord>,
        input: &FormatDescriptor,
        output: &FormatDescriptor,
        _args: Option<&[String]>,
    ) -> Result<Vec<FileRecord>, HandlerError> {
        let unsupported = || HandlerError::Unsupported {
            from: input.format.clone(),
            to: output.format.clone(),
        };
        let from = kind(input).ok_or_else(unsupported)?;
        let to = kind(output).ok_or_else(unsupported)?;

        files
            .iter()
            .map(|file| -> Result<FileRecord, HandlerError> {
                let text = std::str::from_utf8(&file.bytes)
                    .map_err(|e| HandlerError::Decode(format!("{}: {e}", file.name)))?;
                let converted = match (from, to) {
                    (Kind::Markdown, Kind::Html) => markdown_to_html(text),
                    (Kind::Markdown, Kind::Plain) => markdown_to_text(text),
                    (Kind::Html, Kind::Markdown) => html_to_markdown(text),
                    (Kind::Html, Kind::Plain) => html_to_text(text),
                    (Kind::Plain, Kind::Html) => text_to_html(text),
                    (Kind::Plain, Kind::Markdown) => text.to_string(),
                    _ => return Err(unsupported()),
                };
                Ok(FileRecord::new(
                    file.renamed_with_extension(&output.extension),
                    converted.into_bytes(),
                ))
            })
            .collect()
    }
}

// ── Shared helpers ───────────────────────────────────────────────────────────

fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn decode_entities(input: &str) -> String {
    input
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

/// Split on blank lines, dropping empty blocks.
fn blocks(input: &str) -> impl Iterator<Item = &str> {
    RE_BLANK_SPLIT
        .split(input)
        .map(str::trim)
        .filter(|b| !b.is_empty())
}

static RE_BLANK_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\r?\n\s*\r?\n").unwrap());

// ── Markdown → HTML ──────────────────────────────────────────────────────────

static RE_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(#{1,6})\s+(.+?)\s*#*$").unwrap());
static RE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`([^`]+)`").unwrap());
static RE_BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*([^*]+)\*\*").unwrap());
static RE_ITALIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*([^*]+)\*").unwrap());
static RE_LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]]+)\]\(([^)\s]+)\)").unwrap());

fn inline_markdown(line: &str) -> String {
    let s = escape_html(line);
    let s = RE_CODE.replace_all(&s, "<code>$1</code>");
    let s = RE_BOLD.replace_all(&s, "<strong>$1</strong>");
    let s = RE_ITALIC.replace_all(&s, "<em>$1</em>");
    RE_LINK
        .replace_all(&s, r#"<a href="$2">$1</a>"#)
        .into_owned()
}

fn markdown_to_html(input: &str) -> String {
    let mut out = Vec::new();
    for block in blocks(input) {
        let mut paragraph = Vec::new();
        for line in block.lines() {
            if let Some(caps) = RE_HEADING.captures(line.trim()) {
                if !paragraph.is_empty() {
                    out.push(format!("<p>{}</p>", paragraph.join("\n")));
                    paragraph.clear();
                }
                let level = caps[1].len();
                out.push(format!("<h{level}>{}</h{level}>", inline_markdown(&caps[2])));
            } else {
                paragraph.push(inline_markdown(line.trim()));
            }
        }
        if !paragraph.is_empty() {
            out.push(format!("<p>{}</p>", paragraph.join("\n")));
        }
    }
    let mut html = out.join("\n");
    html.push('\n');
    html
}

// ── Markdown → text ──────────────────────────────────────────────────────────

fn markdown_to_text(input: &str) -> String {
    let mut out = Vec::new();
    for block in blocks(input) {
        let lines: Vec<String> = block
            .lines()
            .map(|line| {
                let line = RE_HEADING
                    .captures(line.trim())
                    .map(|c| c[2].to_string())
                    .unwrap_or_else(|| line.trim().to_string());
                let s = RE_LINK.replace_all(&line, "$1 ($2)");
                let s = RE_CODE.replace_all(&s, "$1");
                let s = RE_BOLD.replace_all(&s, "$1");
                RE_ITALIC.replace_all(&s, "$1").into_owned()
            })
            .collect();
        out.push(lines.join("\n"));
    }
    let mut text = out.join("\n\n");
    text.push('\n');
    text
}

// ── HTML → Markdown / text ───────────────────────────────────────────────────

static RE_SCRIPT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</(script|style)>").unwrap());
static RE_H: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<h([1-6])\b[^>]*>(.*?)</h[1-6]>").unwrap());
static RE_STRONG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<(?:strong|b)\b[^>]*>(.*?)</(?:strong|b)>").unwrap());
static RE_EM: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<(?:em|i)\b[^>]*>(.*?)</(?:em|i)>").unwrap());
static RE_CODE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<code\b[^>]*>(.*?)</code>").unwrap());
static RE_A: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?is)<a\b[^>]*href\s*=\s*"([^"]*)"[^>]*>(.*?)</a>"#).unwrap());
static RE_BR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<br\s*/?>").unwrap());
static RE_BLOCK_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)</(p|div|li|ul|ol|h[1-6])>").unwrap());
static RE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]+>").unwrap());
static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn finish(input: &str) -> String {
    let s = RE_TAG.replace_all(input, "");
    let s = decode_entities(&s);
    let s: Vec<&str> = s.lines().map(str::trim).collect();
    let s = RE_BLANK_LINES.replace_all(s.join("\n").trim(), "\n\n").into_owned();
    format!("{s}\n")
}

fn html_to_markdown(input: &str) -> String {
    let s = RE_SCRIPT.replace_all(input, "");
    let s = RE_H.replace_all(&s, |caps: &regex::Captures<'_>| {
        let level: usize = caps[1].parse().unwrap_or(1);
        format!("\n\n{} {}\n\n", "#".repeat(level), caps[2].trim())
    });
    let s = RE_STRONG.replace_all(&s, "**$1**");
    let s = RE_EM.replace_all(&s, "*$1*");
    let s = RE_CODE_TAG.replace_all(&s, "`$1`");
    let s = RE_A.replace_all(&s, "[$2]($1)");
    let s = RE_BR.replace_all(&s, "\n");
    let s = RE_BLOCK_END.replace_all(&s, "\n\n");
    finish(&s)
}

fn html_to_text(input: &str) -> String {
    let s = RE_SCRIPT.replace_all(input, "");
    let s = RE_BR.replace_all(&s, "\n");
    let s = RE_BLOCK_END.replace_all(&s, "\n\n");
    finish(&s)
}

// ── Text → HTML ──────────────────────────────────────────────────────────────

fn text_to_html(input: &str) -> String {
    let paragraphs: Vec<String> = blocks(input)
        .map(|b| format!("<p>{}</p>", escape_html(b).replace('\n', "<br>\n")))
        .collect();
    format!("{}\n", paragraphs.join("\n"))
}
