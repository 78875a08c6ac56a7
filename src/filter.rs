use std::collections::HashSet;
use url::Url;

/// Prunes raw hyperlink candidates down to canonical absolute urls.
///
/// Relative references are resolved against `base`; candidates that are
/// already absolute are kept verbatim, since url equality across the crawl
/// is raw string equality and re-serializing would normalize them.
/// The output carries no same-domain guarantee, scope filtering belongs to
/// the scheduler.
pub fn filter_links<I>(base: &Url, candidates: I) -> HashSet<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut filtered = HashSet::new();
    for candidate in candidates {
        let candidate = candidate.as_ref().trim();
        if candidate.is_empty() || candidate.contains(char::is_whitespace) {
            continue;
        }
        // Matches the raw prefix, so javascript:void(0) and javascript.com
        // are both dropped.
        if candidate.starts_with("javascript") {
            continue;
        }
        let resolved = if candidate.starts_with("http") {
            candidate.to_string()
        } else {
            match base.join(candidate) {
                Ok(url) => url.to_string(),
                Err(_) => continue,
            }
        };
        if is_valid_absolute_url(&resolved) {
            filtered.insert(resolved);
        }
    }
    filtered
}

/// Well-formedness check for an absolute url: it must parse and name a host.
pub fn is_valid_absolute_url(s: &str) -> bool {
    if s.contains(char::is_whitespace) {
        return false;
    }
    match Url::parse(s) {
        Ok(url) => url.has_host(),
        Err(_) => false,
    }
}
