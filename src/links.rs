//! Absolute `next`/`prev` link construction (§4.5). Links are built from the
//! configured public scheme+host, preserving every original query parameter
//! with `page` replaced — never inferred from the (possibly
//! proxied/rewritten) inbound request URL.

use url::Url;

const PAGE_PARAM: &str = "page";

/// Whether a `next` link should be emitted: strictly more rows exist beyond
/// this page (`(page * page_size) < total`), or — when the total is unknown
/// — a full page was returned (so more rows might follow).
pub fn has_next(page: u32, page_size: u32, total: Option<u64>, rows_returned: usize) -> bool {
    match total {
        Some(total) => (page as u64) * (page_size as u64) < total,
        None => rows_returned == page_size as usize,
    }
}

pub fn has_prev(page: u32) -> bool {
    page > 1
}

/// Rebuild `path` with `pairs` as its query string, pointed at `new_page`,
/// resolved against `base_url`.
pub fn build_link(base_url: &str, path: &str, pairs: &[(String, String)], new_page: u32) -> Option<String> {
    let mut url = Url::parse(base_url).ok()?.join(path).ok()?;
    {
        let mut query = url.query_pairs_mut();
        query.clear();
        let mut replaced = false;
        for (key, value) in pairs {
            if key == PAGE_PARAM {
                query.append_pair(PAGE_PARAM, &new_page.to_string());
                replaced = true;
            } else {
                query.append_pair(key, value);
            }
        }
        if !replaced {
            query.append_pair(PAGE_PARAM, &new_page.to_string());
        }
    }
    Some(url.to_string())
}

pub struct PageLinks {
    pub next: Option<String>,
    pub prev: Option<String>,
}

pub fn build_page_links(
    base_url: &str,
    path: &str,
    pairs: &[(String, String)],
    page: u32,
    page_size: u32,
    total: Option<u64>,
    rows_returned: usize,
) -> PageLinks {
    let next = has_next(page, page_size, total, rows_returned)
        .then(|| build_link(base_url, path, pairs, page + 1))
        .flatten();
    let prev = has_prev(page)
        .then(|| build_link(base_url, path, pairs, page - 1))
        .flatten();
    PageLinks { next, prev }
}
