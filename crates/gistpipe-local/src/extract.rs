//! HTML → text extraction.
//!
//! Two deterministic heuristics, flattened to text with `scraper`:
//! - [`extract_main_text`]: boilerplate removal that favours recall (extra text beats missing
//!   article text).
//! - [`readable_document`]: the `readability` crate's scorer, returning the title and main region.

use html_scraper::{ElementRef, Html, Selector};
use url::Url;

fn has_any_text(s: &str) -> bool {
    s.chars().any(|c| !c.is_whitespace())
}

fn class_or_id_lc(el: &ElementRef) -> String {
    let mut out = String::new();
    if let Some(c) = el.value().attr("class") {
        out.push_str(c);
        out.push(' ');
    }
    if let Some(i) = el.value().attr("id") {
        out.push_str(i);
    }
    out.to_ascii_lowercase()
}

fn is_generic_boilerplate_container(el: &ElementRef) -> bool {
    // Structural UI words only; no per-site rules.
    let s = class_or_id_lc(el);
    if s.is_empty() {
        return false;
    }
    [
        "nav",
        "navbar",
        "menu",
        "sidebar",
        "footer",
        "header",
        "banner",
        "cookie",
        "consent",
        "ads",
        "advert",
        "promo",
        "subscribe",
        "newsletter",
    ]
    .iter()
    .any(|bad| s.contains(bad))
}

fn is_never_content_tag(tag: &str) -> bool {
    matches!(
        tag,
        "script"
            | "style"
            | "noscript"
            | "template"
            | "iframe"
            | "svg"
            | "canvas"
            | "button"
            | "select"
            | "form"
            | "nav"
            | "header"
            | "footer"
            | "aside"
    )
}

fn is_skipped(el: &ElementRef) -> bool {
    let tag = el.value().name();
    if is_never_content_tag(tag) {
        return true;
    }
    // Class words on the document roots or the article itself say nothing about boilerplate.
    !matches!(tag, "html" | "body" | "main" | "article") && is_generic_boilerplate_container(el)
}

fn is_block_tag(tag: &str) -> bool {
    matches!(
        tag,
        "p" | "div"
            | "section"
            | "article"
            | "main"
            | "li"
            | "ul"
            | "ol"
            | "dl"
            | "dt"
            | "dd"
            | "blockquote"
            | "pre"
            | "table"
            | "tr"
            | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
            | "figure"
            | "figcaption"
            | "br"
            | "hr"
    )
}

fn collect_block_text(el: ElementRef<'_>, out: &mut String) {
    for child in el.children() {
        if let Some(c) = ElementRef::wrap(child) {
            if is_skipped(&c) {
                continue;
            }
            let block = is_block_tag(c.value().name());
            if block {
                out.push('\n');
            }
            collect_block_text(c, out);
            if block {
                out.push('\n');
            }
        } else if let Some(t) = child.value().as_text() {
            out.push_str(t);
        }
    }
}

/// One paragraph per line, whitespace collapsed, blank lines dropped.
fn normalize_lines(s: &str) -> String {
    s.lines()
        .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn block_text(el: ElementRef<'_>) -> String {
    let mut raw = String::new();
    collect_block_text(el, &mut raw);
    normalize_lines(&raw)
}

fn element_text_chars(el: &ElementRef) -> usize {
    el.text().map(|t| t.chars().count()).sum()
}

fn element_link_text_chars(el: &ElementRef) -> usize {
    let Ok(sel) = Selector::parse("a") else {
        return 0;
    };
    el.select(&sel)
        .map(|a| a.text().map(|t| t.chars().count()).sum::<usize>())
        .sum()
}

fn pick_main_element(doc: &Html, max_elems: usize) -> Option<ElementRef<'_>> {
    let max_elems = max_elems.clamp(50, 50_000);
    let sel = Selector::parse("article, main, section, div").ok()?;
    let mut best_score: i64 = 0;
    let mut best: Option<ElementRef<'_>> = None;

    for el in doc.select(&sel).take(max_elems) {
        if is_generic_boilerplate_container(&el) {
            continue;
        }
        let txt = element_text_chars(&el);
        // Low enough to work for small single-article pages; tag bonuses and link-density
        // penalties keep nav widgets out.
        if txt < 20 {
            continue;
        }
        let link_txt = element_link_text_chars(&el);
        let mut score = txt as i64 - 2 * (link_txt as i64);
        match el.value().name() {
            "article" => score += 500,
            "main" => score += 300,
            _ => {}
        }
        if link_txt > txt / 2 {
            score -= 500;
        }
        if score > best_score {
            best_score = score;
            best = Some(el);
        }
    }
    best
}

/// Main-content text of an HTML page, favouring recall.
///
/// The densest article-like block wins unless it holds well under the words of the whole
/// de-boilerplated body, in which case the body is returned instead: a page whose text is
/// split over several sibling blocks must not lose all but one of them.
pub fn extract_main_text(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let body_text = Selector::parse("body")
        .ok()
        .and_then(|s| doc.select(&s).next())
        .map(block_text)
        .unwrap_or_default();
    let main_text = pick_main_element(&doc, 20_000)
        .map(block_text)
        .unwrap_or_default();

    let body_words = gistpipe_core::word_count(&body_text);
    let main_words = gistpipe_core::word_count(&main_text);
    let out = if main_words * 10 >= body_words * 6 && has_any_text(&main_text) {
        main_text
    } else {
        body_text
    };
    has_any_text(&out).then_some(out)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadableDocument {
    pub title: Option<String>,
    /// Main region text, one paragraph per line.
    pub text: String,
}

/// Shorten a page title by dropping site-name segments (`Story - Site`).
pub fn short_title(title: &str) -> String {
    let title = title.split_whitespace().collect::<Vec<_>>().join(" ");
    for delim in [" | ", " - ", " – ", " — ", " :: ", " / ", " » "] {
        if title.contains(delim) {
            if let Some(longest) = title
                .split(delim)
                .map(str::trim)
                .max_by_key(|p| p.chars().count())
            {
                if gistpipe_core::word_count(longest) >= 2 {
                    return longest.to_string();
                }
            }
        }
    }
    title
}

/// Mozilla-style readability pass (`readability` crate) over an already fetched page.
///
/// The winning region comes back as HTML and is flattened with the block rules of
/// [`extract_main_text`].
pub fn readable_document(html: &str, url: &Url) -> Option<ReadableDocument> {
    let product = match readability::extractor::extract(&mut html.as_bytes(), url) {
        Ok(p) => p,
        Err(e) => {
            tracing::debug!(url = %url, error = %e, "readability found no candidate");
            return None;
        }
    };
    let region = Html::parse_fragment(&product.content);
    let mut text = block_text(region.root_element());
    if !has_any_text(&text) {
        text = normalize_lines(&product.text);
    }
    let title = Some(short_title(&product.title)).filter(|t| !t.is_empty());
    has_any_text(&text).then_some(ReadableDocument { title, text })
}
