//! DOM helpers shared by the vendor scrapers.
//!
//! Pages are parsed once with [`scraper::Html`]; the vendor modules hold
//! their own compiled selectors and hand matched elements to these helpers.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

static META_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("meta[content]").expect("valid selector"));
static TITLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("valid selector"));
static LIST_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("ul").expect("valid selector"));
static ITEM_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("li").expect("valid selector"));
static ROW_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("tr").expect("valid selector"));
static CELL_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("th, td").expect("valid selector"));

/// Lower-cased markers of vendor robot-check interstitials.
const ROBOT_CHECK_MARKERS: &[&str] = &[
    "/errors/validatecaptcha",
    "<title>robot check</title>",
    "type the characters you see in this image",
    "are you a human",
];

/// Compiles one selector per entry of a vendor's fallback list.
///
/// # Panics
///
/// Panics when an entry is not valid CSS.
pub(crate) fn selectors(css: &[&str]) -> Vec<Selector> {
    css.iter()
        .map(|s| Selector::parse(s).expect("valid selector"))
        .collect()
}

/// First element matched by `selector` anywhere below `scope`.
pub(crate) fn first<'a>(scope: ElementRef<'a>, selector: &Selector) -> Option<ElementRef<'a>> {
    scope.select(selector).next()
}

/// Non-empty value of `attr` on `element`, trimmed.
pub(crate) fn attr(element: ElementRef<'_>, name: &str) -> Option<String> {
    element
        .value()
        .attr(name)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// `content` of the first `<meta>` whose `key_attr` equals `key_value`.
pub(crate) fn find_meta_content(doc: &Html, key_attr: &str, key_value: &str) -> Option<String> {
    doc.select(&META_SELECTOR).find_map(|meta| {
        let key = meta.value().attr(key_attr)?;
        if key.trim().eq_ignore_ascii_case(key_value) {
            attr(meta, "content")
        } else {
            None
        }
    })
}

/// Text of every `<li>` below `element`, blanks dropped.
pub(crate) fn list_items(element: ElementRef<'_>) -> Vec<String> {
    element
        .select(&ITEM_SELECTOR)
        .map(text_content)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Items of the first `<ul>` below `element`.
pub(crate) fn first_list(element: ElementRef<'_>) -> Vec<String> {
    first(element, &LIST_SELECTOR)
        .map(list_items)
        .unwrap_or_default()
}

/// `"key: value"` for every row below `element` with two non-empty cells.
pub(crate) fn table_rows(element: ElementRef<'_>) -> Vec<String> {
    element
        .select(&ROW_SELECTOR)
        .filter_map(|row| {
            let mut cells = row.select(&CELL_SELECTOR).map(text_content);
            let key = cells.next().filter(|k| !k.is_empty())?;
            let value = cells.next().filter(|v| !v.is_empty())?;
            Some(format!("{key}: {value}"))
        })
        .collect()
}

/// Text of the document `<title>`.
pub(crate) fn document_title(doc: &Html) -> Option<String> {
    doc.select(&TITLE_SELECTOR)
        .next()
        .map(text_content)
        .filter(|t| !t.is_empty())
}

/// `true` when the page is a captcha or robot-check interstitial.
pub(crate) fn looks_like_robot_check(html: &str) -> bool {
    let lower = html.to_ascii_lowercase();
    ROBOT_CHECK_MARKERS.iter().any(|m| lower.contains(m))
}

/// Text below `element` with whitespace runs collapsed to one space.
pub(crate) fn text_content(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Turns displayed price text such as `"₹1,29,999.00"` into `"129999.00"`.
///
/// Currency symbols, thousands separators, and whitespace are dropped.
/// Returns `None` when no digits remain or the result has more than one
/// decimal point.
pub(crate) fn normalize_price_text(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let cleaned = cleaned.trim_matches('.');

    if cleaned.is_empty() || cleaned.matches('.').count() > 1 {
        return None;
    }
    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(cleaned.to_string())
}
