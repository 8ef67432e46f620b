//! JSON page encoder (§4.6): `{data, links, meta}`. `links.profile` and
//! `links.swagger` are always present; `next`/`prev` follow the link policy
//! in `links::build_page_links`.

use crate::domain::ResourceId;
use crate::links::build_page_links;
use serde::Serialize;
use serde_json::Value as JsonValue;

#[derive(Debug, Serialize, PartialEq)]
pub struct JsonLinks {
    pub profile: String,
    pub swagger: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev: Option<String>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct JsonMeta {
    pub page: u32,
    pub page_size: u32,
    pub total: Option<u64>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct JsonPage {
    pub data: Vec<JsonValue>,
    pub links: JsonLinks,
    pub meta: JsonMeta,
}

/// Build the JSON page envelope for one data response.
#[allow(clippy::too_many_arguments)]
pub fn build_json_page(
    base_url: &str,
    resource_id: ResourceId,
    data_path: &str,
    original_pairs: &[(String, String)],
    page: u32,
    page_size: u32,
    total: Option<u64>,
    rows: Vec<JsonValue>,
) -> JsonPage {
    let page_links = build_page_links(
        base_url,
        data_path,
        original_pairs,
        page,
        page_size,
        total,
        rows.len(),
    );
    JsonPage {
        links: JsonLinks {
            profile: format!("{base_url}/api/resources/{resource_id}/profile/"),
            swagger: format!("{base_url}/api/resources/{resource_id}/swagger/"),
            next: page_links.next,
            prev: page_links.prev,
        },
        meta: JsonMeta {
            page,
            page_size,
            total,
        },
        data: rows,
    }
}
