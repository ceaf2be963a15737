//! Boilerplate removal.
//!
//! A readability-style extractor built on `scraper`. It picks the most likely
//! article container, drops navigation, ads, scripts and other page chrome,
//! and returns the remaining text as paragraphs separated by blank lines.
//!
//! The extractor never panics on bad markup: `html5ever` recovers from any
//! input, and the only failure is a document with nothing in it.

use crate::utils::collapse_whitespace;
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

/// Tags whose entire subtree is page chrome rather than article text.
const BOILERPLATE_TAGS: &[&str] = &[
    "script", "style", "noscript", "nav", "header", "footer", "aside", "form", "iframe", "svg",
    "template", "button", "select",
];

/// A `header` inside an `article` holds the headline and lead, not site chrome.
const ARTICLE_HEADER: &str = "header";

/// CMS taxonomy classes (`tag-social-media`, `category-advertising`) describe
/// the story, not the element, and never count as hints.
const TAXONOMY_PREFIXES: &[&str] = &["tag-", "category-", "post-", "type-", "format-"];

/// Tags that hold a readable block of text. Nested blocks are skipped so
/// that an `li` wrapping a `p` is not emitted twice.
const BLOCK_TAGS: &[&str] = &["p", "h2", "h3", "h4", "li", "pre", "blockquote"];

/// Matched against a single word of a class or id token, split on `-` and `_`.
static BOILERPLATE_HINT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(nav|navbar|menu|footer|sidebar|advert|advertisement|ad|ads|promo|sponsored|share|social|related|comments?|cookie|newsletter|subscribe|banner|popup|modal|breadcrumbs?)$",
    )
    .expect("static regex")
});

static OG_TITLE: Lazy<Selector> = Lazy::new(|| selector(r#"meta[property="og:title"]"#));
static TITLE: Lazy<Selector> = Lazy::new(|| selector("title"));
static H1: Lazy<Selector> = Lazy::new(|| selector("h1"));
static BLOCKS: Lazy<Selector> = Lazy::new(|| selector(&BLOCK_TAGS.join(", ")));
static BODY: Lazy<Selector> = Lazy::new(|| selector("body"));

/// Candidate article containers, most specific first.
static ROOTS: Lazy<Vec<Selector>> = Lazy::new(|| {
    [
        "article",
        "main",
        r#"[role="main"]"#,
        "#content",
        "#main-content",
        ".article-body",
        ".article-content",
        ".post-content",
        ".entry-content",
        ".story-body",
    ]
    .iter()
    .map(|s| selector(s))
    .collect()
});

fn selector(s: &str) -> Selector {
    Selector::parse(s).expect("static selector")
}

/// Title and readable text of a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub title: String,
    pub content: String,
}

/// Why a document could not be turned into an [`Article`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReadabilityError {
    /// The body was empty or whitespace only.
    #[error("empty document")]
    EmptyDocument,
}

/// Extract the title and main readable text from raw HTML.
///
/// A page with markup but no readable text yields an [`Article`] with empty
/// `content`; only a blank document is an error.
pub fn extract(html: &str) -> Result<Article, ReadabilityError> {
    if html.trim().is_empty() {
        return Err(ReadabilityError::EmptyDocument);
    }

    let doc = Html::parse_document(html);
    let title = extract_title(&doc);

    // A candidate nested in chrome is a teaser card, not the story
    let page = doc.root_element();
    let root = ROOTS
        .iter()
        .find_map(|sel| {
            doc.select(sel)
                .find(|el| !inside_boilerplate(*el, page) && !text_of(*el, *el).is_empty())
        })
        .or_else(|| doc.select(&BODY).next())
        .unwrap_or_else(|| doc.root_element());

    let blocks = root
        .select(&BLOCKS)
        .filter(|el| !inside_boilerplate(*el, root) && !inside_block(*el, root))
        .map(|el| text_of(el, root))
        .filter(|text| !text.is_empty())
        .dedup()
        .collect::<Vec<_>>();

    let content = if blocks.is_empty() {
        text_of(root, root)
    } else {
        blocks.join("\n\n")
    };

    Ok(Article { title, content })
}

fn extract_title(doc: &Html) -> String {
    let og = doc
        .select(&OG_TITLE)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(collapse_whitespace);
    let from_tag = |sel: &Selector| {
        doc.select(sel)
            .next()
            .map(|el| collapse_whitespace(&el.text().collect::<String>()))
    };

    og.filter(|t| !t.is_empty())
        .or_else(|| from_tag(&*TITLE).filter(|t| !t.is_empty()))
        .or_else(|| from_tag(&*H1).filter(|t| !t.is_empty()))
        .unwrap_or_default()
}

fn is_boilerplate(el: &ElementRef) -> bool {
    let value = el.value();
    if value.name() == ARTICLE_HEADER {
        return !el
            .ancestors()
            .filter_map(ElementRef::wrap)
            .any(|a| a.value().name() == "article");
    }
    if BOILERPLATE_TAGS.contains(&value.name()) {
        return true;
    }
    if value.attr("aria-hidden") == Some("true") {
        return true;
    }
    value
        .attr("class")
        .into_iter()
        .chain(value.id())
        .flat_map(str::split_whitespace)
        .any(has_boilerplate_hint)
}

/// Whether one class or id token names page chrome, e.g. `share-tools` or `ad_slot`.
fn has_boilerplate_hint(token: &str) -> bool {
    let lower = token.to_ascii_lowercase();
    if TAXONOMY_PREFIXES.iter().any(|p| lower.starts_with(p)) {
        return false;
    }
    lower
        .split(['-', '_'])
        .any(|word| BOILERPLATE_HINT.is_match(word))
}

/// Whether `el` or any ancestor strictly below `root` is page chrome.
fn inside_boilerplate(el: ElementRef, root: ElementRef) -> bool {
    std::iter::once(el)
        .chain(el.ancestors().filter_map(ElementRef::wrap))
        .take_while(|a| a.id() != root.id())
        .any(|a| is_boilerplate(&a))
}

/// Whether `el` sits inside another text block below `root`.
fn inside_block(el: ElementRef, root: ElementRef) -> bool {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .take_while(|a| a.id() != root.id())
        .any(|a| BLOCK_TAGS.contains(&a.value().name()))
}

/// Text under `el`, skipping any subtree that is page chrome below `root`.
fn text_of(el: ElementRef, root: ElementRef) -> String {
    let raw = el
        .descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let parent = node.parent().and_then(ElementRef::wrap)?;
            if inside_boilerplate(parent, root) {
                None
            } else {
                Some(&**text)
            }
        })
        .collect::<String>();
    collapse_whitespace(&raw)
}
