//! HTML to readable text.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

/// Never content.
const STRIPPED: &[&str] = &[
    "script", "style", "noscript", "iframe", "object", "embed", "video", "audio", "svg", "canvas",
    "template",
];

/// Page chrome, dropped only when falling back to `<body>`.
const BOILERPLATE: &[&str] = &["nav", "header", "footer", "aside", "form"];

/// Main-content candidates, most specific first.
const MAIN_SELECTORS: &[&str] = &[
    "article",
    "main",
    r#"[role="main"]"#,
    "#content",
    ".content",
    "#main-content",
    ".main-content",
    ".post-content",
    ".entry-content",
    ".article-body",
];

/// Elements that end a line of text.
const BLOCKS: &[&str] = &[
    "p", "div", "br", "li", "ul", "ol", "h1", "h2", "h3", "h4", "h5", "h6", "tr", "table",
    "section", "article", "main", "blockquote", "pre", "dt", "dd", "figcaption",
];

static MAIN: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    MAIN_SELECTORS
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .collect()
});
static BODY: LazyLock<Option<Selector>> = LazyLock::new(|| Selector::parse("body").ok());
static TITLE: LazyLock<Option<Selector>> = LazyLock::new(|| Selector::parse("title").ok());

/// Readable content of a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanedPage {
    pub title: Option<String>,
    pub text: String,
}

/// Reduce `html` to the text of its main content block.
///
/// Tries the main-content selectors in order; the first with any text
/// wins. Otherwise falls back to `<body>` without navigation, headers,
/// footers, asides and forms. Whitespace is collapsed and blank lines
/// dropped.
pub fn clean_html(html: &str) -> CleanedPage {
    let document = Html::parse_document(html);

    let title = TITLE
        .as_ref()
        .and_then(|selector| document.select(selector).next())
        .map(|t| collapse(&t.text().collect::<String>()))
        .filter(|t| !t.is_empty());

    for selector in MAIN.iter() {
        if let Some(element) = document.select(selector).next() {
            let text = element_text(element, STRIPPED);
            if !text.is_empty() {
                return CleanedPage { title, text };
            }
        }
    }

    let skip: Vec<&str> = STRIPPED.iter().chain(BOILERPLATE).copied().collect();
    let text = BODY
        .as_ref()
        .and_then(|selector| document.select(selector).next())
        .map(|body| element_text(body, &skip))
        .unwrap_or_default();

    CleanedPage { title, text }
}

fn element_text(element: ElementRef<'_>, skip: &[&str]) -> String {
    let mut raw = String::new();
    collect_text(element, skip, &mut raw);

    raw.lines()
        .map(collapse)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn collect_text(element: ElementRef<'_>, skip: &[&str], out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            // Source line breaks are not content line breaks
            out.extend(text.chars().map(|c| if c.is_whitespace() { ' ' } else { c }));
        } else if let Some(child) = ElementRef::wrap(child) {
            let name = child.value().name();
            if skip.contains(&name) {
                continue;
            }
            let block = BLOCKS.contains(&name);
            if block {
                out.push('\n');
            }
            collect_text(child, skip, out);
            if block {
                out.push('\n');
            } else {
                out.push(' ');
            }
        }
    }
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
