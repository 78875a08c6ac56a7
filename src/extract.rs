use lazy_static::lazy_static;
use scraper::{Html, Selector};

const E: &str = "Invalid selector";
lazy_static! {
    static ref A: Selector = Selector::parse("a").expect(E);
}

/// Raw href values in document order. Anchors without an href contribute an
/// empty string so every anchor reaches the filter.
pub fn extract_links(doc: &Html) -> Vec<String> {
    doc.select(&A)
        .map(|a| a.value().attr("href").unwrap_or("").to_string())
        .collect()
}
