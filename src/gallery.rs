//! Catalog retrieval: query construction, JSON:API response normalization
//! and the paging state the reducer drives.
//!
//! The catalog API is JSON:API-shaped but loose in practice: `data` arrives
//! as an object or an array depending on result count, and
//! `meta.cursor.totalRecords` shows up as a number, a numeric string, or not
//! at all. Normalization here accepts all of those instead of failing the
//! whole page.

use serde::{Deserialize, Serialize};

use crate::{API_BASE, DELIVERY_DOMAIN, PAGE_SIZE};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceId(String);

impl SourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An enabled origin the catalog can serve assets from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub id: SourceId,
    pub name: String,
    pub domain: String,
}

/// One asset row of a catalog page, already resolved to its delivery URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRecord {
    pub url: String,
    pub origin_path: String,
    pub file_name: String,
    pub content_type: Option<String>,
    pub file_size: Option<u64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageState {
    pub current_index: usize,
    pub total_page_count: usize,
}

/// One parsed catalog page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogPage {
    pub assets: Vec<AssetRecord>,
    pub total_records: u64,
}

pub fn total_page_count(total_records: u64) -> usize {
    usize::try_from(total_records.div_ceil(PAGE_SIZE)).unwrap_or(usize::MAX)
}

pub fn delivery_url(source_name: &str, origin_path: &str) -> String {
    format!("https://{}.{}{}", source_name, DELIVERY_DOMAIN, origin_path)
}

/// Catalog page URL. Filter text fans out across categories, keywords and
/// origin path, OR-combined by the API.
pub fn catalog_page_url(source_id: &SourceId, page_index: usize, filter: &str) -> String {
    let mut query = url::form_urlencoded::Serializer::new(String::new());
    query.append_pair("page[number]", &page_index.to_string());
    query.append_pair("page[size]", &PAGE_SIZE.to_string());
    if !filter.is_empty() {
        query.append_pair("filter[or:categories]", filter);
        query.append_pair("filter[or:keywords]", filter);
        query.append_pair("filter[or:origin_path]", filter);
    }
    format!("{}/assets/{}?{}", API_BASE, source_id, query.finish())
}

pub fn sources_url() -> String {
    format!("{}/sources", API_BASE)
}

/// Paging and fetch bookkeeping for the currently selected source.
#[derive(Debug, Clone, Default)]
pub struct GalleryState {
    pub assets: Vec<AssetRecord>,
    pub page: PageState,
    pub total_records: u64,
    /// Applied (settled) filter text. Empty means unfiltered.
    pub filter: String,
    pub is_fetching: bool,
    /// Set when the latest fetch errored. The empty-catalog state must not
    /// be shown while this is up.
    pub last_fetch_failed: bool,
    /// At least one page arrived for the current source.
    pub has_loaded: bool,
    next_seq: u64,
    current_seq: Option<u64>,
    no_images_reported: bool,
}

impl GalleryState {
    /// Issue a new fetch sequence number, superseding any fetch in flight.
    pub fn begin_fetch(&mut self) -> u64 {
        self.next_seq += 1;
        self.current_seq = Some(self.next_seq);
        self.is_fetching = true;
        self.next_seq
    }

    pub fn is_current(&self, seq: u64) -> bool {
        self.current_seq == Some(seq)
    }

    pub fn apply_page(&mut self, page: CatalogPage) {
        self.is_fetching = false;
        self.last_fetch_failed = false;
        self.has_loaded = true;
        self.assets = page.assets;
        self.total_records = page.total_records;
        self.page.total_page_count = total_page_count(page.total_records);
        if self.page.total_page_count > 0
            && self.page.current_index >= self.page.total_page_count
        {
            self.page.current_index = self.page.total_page_count - 1;
        }
    }

    pub fn apply_failure(&mut self) {
        self.is_fetching = false;
        self.last_fetch_failed = true;
        self.assets = Vec::new();
        self.total_records = 0;
        self.page.total_page_count = 0;
    }

    /// True at most once per selected source, when a successful unfiltered
    /// fetch came back empty.
    pub fn should_report_no_images(&mut self) -> bool {
        if self.last_fetch_failed
            || self.no_images_reported
            || !self.filter.is_empty()
            || self.page.total_page_count > 0
        {
            return false;
        }
        self.no_images_reported = true;
        true
    }

    /// Back to a pristine state for a newly selected source. Bumping past
    /// the old sequence numbers discards any fetch still in flight.
    pub fn reset_for_source(&mut self) {
        let next_seq = self.next_seq;
        *self = GalleryState {
            next_seq,
            ..GalleryState::default()
        };
    }
}

// --- Wire types ---------------------------------------------------------

/// `data` may be a single resource object or an array of them.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

#[derive(Debug, Deserialize)]
struct SourcesDocument {
    #[serde(default)]
    data: OneOrMany<SourceResource>,
}

#[derive(Debug, Deserialize)]
struct SourceResource {
    id: String,
    #[serde(default)]
    attributes: SourceAttributes,
}

#[derive(Debug, Default, Deserialize)]
struct SourceAttributes {
    #[serde(default)]
    enabled: bool,
    #[serde(default)]
    name: String,
    #[serde(default)]
    deployment: SourceDeployment,
}

#[derive(Debug, Default, Deserialize)]
struct SourceDeployment {
    #[serde(default)]
    imgix_subdomains: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct AssetsDocument {
    #[serde(default)]
    data: OneOrMany<AssetResource>,
    #[serde(default)]
    meta: AssetsMeta,
}

#[derive(Debug, Default, Deserialize)]
struct AssetsMeta {
    #[serde(default)]
    cursor: AssetsCursor,
}

#[derive(Debug, Default, Deserialize)]
struct AssetsCursor {
    #[serde(default, rename = "totalRecords")]
    total_records: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct AssetResource {
    #[serde(default)]
    attributes: AssetAttributes,
}

#[derive(Debug, Default, Deserialize)]
struct AssetAttributes {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    origin_path: String,
    #[serde(default)]
    content_type: Option<String>,
    #[serde(default)]
    file_size: Option<u64>,
    #[serde(default)]
    media_width: Option<u32>,
    #[serde(default)]
    media_height: Option<u32>,
}

/// Keep enabled sources that have a deployed subdomain; skip the rest.
pub fn parse_sources(body: &[u8]) -> Result<Vec<Source>, serde_json::Error> {
    let document: SourcesDocument = serde_json::from_slice(body)?;
    let sources = document
        .data
        .into_vec()
        .into_iter()
        .filter(|resource| resource.attributes.enabled)
        .filter_map(|resource| {
            let domain = resource.attributes.deployment.imgix_subdomains.first()?;
            Some(Source {
                id: SourceId::new(resource.id),
                name: resource.attributes.name.clone(),
                domain: domain.clone(),
            })
        })
        .collect();
    Ok(sources)
}

pub fn parse_asset_page(source: &Source, body: &[u8]) -> Result<CatalogPage, serde_json::Error> {
    let document: AssetsDocument = serde_json::from_slice(body)?;
    let total_records = coerce_total_records(document.meta.cursor.total_records.as_ref());
    let assets = document
        .data
        .into_vec()
        .into_iter()
        .map(|resource| {
            let attributes = resource.attributes;
            let file_name = attributes.name.unwrap_or_else(|| {
                attributes
                    .origin_path
                    .rsplit('/')
                    .next()
                    .unwrap_or_default()
                    .to_string()
            });
            AssetRecord {
                url: delivery_url(&source.name, &attributes.origin_path),
                origin_path: attributes.origin_path,
                file_name,
                content_type: attributes.content_type,
                file_size: attributes.file_size,
                width: attributes.media_width,
                height: attributes.media_height,
            }
        })
        .collect();
    Ok(CatalogPage {
        assets,
        total_records,
    })
}

fn coerce_total_records(value: Option<&serde_json::Value>) -> u64 {
    match value {
        Some(serde_json::Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(serde_json::Value::String(s)) => s.parse().unwrap_or(0),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn demo_source() -> Source {
        Source {
            id: SourceId::new("src-1"),
            name: "acme-images".to_string(),
            domain: "acme-images".to_string(),
        }
    }

    mod pagination_tests {
        use super::*;

        #[test]
        fn test_page_count_rounds_up() {
            assert_eq!(total_page_count(0), 0);
            assert_eq!(total_page_count(1), 1);
            assert_eq!(total_page_count(18), 1);
            assert_eq!(total_page_count(19), 2);
            assert_eq!(total_page_count(40), 3);
        }

        proptest! {
            #[test]
            fn prop_page_count_covers_all_records(total in 0u64..1_000_000) {
                let pages = total_page_count(total) as u64;
                prop_assert!(pages * PAGE_SIZE >= total);
                if total > 0 {
                    prop_assert!((pages - 1) * PAGE_SIZE < total);
                }
            }
        }
    }

    mod query_tests {
        use super::*;

        #[test]
        fn test_catalog_page_url_without_filter() {
            let url = catalog_page_url(&SourceId::new("src-1"), 2, "");
            assert!(url.starts_with("https://api.imgix.com/api/v1/assets/src-1?"));
            assert!(url.contains("page%5Bnumber%5D=2"));
            assert!(url.contains("page%5Bsize%5D=18"));
            assert!(!url.contains("filter"));
        }

        #[test]
        fn test_catalog_page_url_with_filter() {
            let url = catalog_page_url(&SourceId::new("src-1"), 0, "summer sale");
            assert!(url.contains("filter%5Bor%3Acategories%5D=summer+sale"));
            assert!(url.contains("filter%5Bor%3Akeywords%5D=summer+sale"));
            assert!(url.contains("filter%5Bor%3Aorigin_path%5D=summer+sale"));
        }
    }

    mod parse_tests {
        use super::*;

        #[test]
        fn test_parse_sources_filters_disabled_and_undeployed() {
            let body = serde_json::json!({
                "data": [
                    {
                        "id": "a",
                        "attributes": {
                            "enabled": true,
                            "name": "alpha",
                            "deployment": { "imgix_subdomains": ["alpha-cdn"] }
                        }
                    },
                    {
                        "id": "b",
                        "attributes": {
                            "enabled": false,
                            "name": "bravo",
                            "deployment": { "imgix_subdomains": ["bravo-cdn"] }
                        }
                    },
                    {
                        "id": "c",
                        "attributes": {
                            "enabled": true,
                            "name": "charlie",
                            "deployment": { "imgix_subdomains": [] }
                        }
                    }
                ]
            });
            let sources = parse_sources(&serde_json::to_vec(&body).unwrap()).unwrap();
            assert_eq!(sources.len(), 1);
            assert_eq!(sources[0].id.as_str(), "a");
            assert_eq!(sources[0].domain, "alpha-cdn");
        }

        #[test]
        fn test_parse_sources_single_object_data() {
            let body = serde_json::json!({
                "data": {
                    "id": "only",
                    "attributes": {
                        "enabled": true,
                        "name": "solo",
                        "deployment": { "imgix_subdomains": ["solo-cdn"] }
                    }
                }
            });
            let sources = parse_sources(&serde_json::to_vec(&body).unwrap()).unwrap();
            assert_eq!(sources.len(), 1);
            assert_eq!(sources[0].name, "solo");
        }

        #[test]
        fn test_parse_asset_page_builds_delivery_urls() {
            let body = serde_json::json!({
                "data": [{
                    "attributes": {
                        "origin_path": "/photos/cat.jpg",
                        "content_type": "image/jpeg",
                        "file_size": 1234,
                        "media_width": 640,
                        "media_height": 480
                    }
                }],
                "meta": { "cursor": { "totalRecords": 40 } }
            });
            let page = parse_asset_page(&demo_source(), &serde_json::to_vec(&body).unwrap())
                .unwrap();
            assert_eq!(page.total_records, 40);
            assert_eq!(page.assets.len(), 1);
            assert_eq!(
                page.assets[0].url,
                "https://acme-images.imgix.net/photos/cat.jpg"
            );
            assert_eq!(page.assets[0].file_name, "cat.jpg");
            assert_eq!(page.assets[0].width, Some(640));
        }

        #[test]
        fn test_parse_asset_page_total_records_as_string() {
            let body = serde_json::json!({
                "data": [],
                "meta": { "cursor": { "totalRecords": "19" } }
            });
            let page = parse_asset_page(&demo_source(), &serde_json::to_vec(&body).unwrap())
                .unwrap();
            assert_eq!(page.total_records, 19);
        }

        #[test]
        fn test_parse_asset_page_missing_meta_defaults_to_zero() {
            let body = serde_json::json!({ "data": [] });
            let page = parse_asset_page(&demo_source(), &serde_json::to_vec(&body).unwrap())
                .unwrap();
            assert_eq!(page.total_records, 0);
            assert!(page.assets.is_empty());
        }

        #[test]
        fn test_parse_asset_page_missing_geometry_keeps_record() {
            let body = serde_json::json!({
                "data": [{ "attributes": { "origin_path": "/x.png" } }],
                "meta": { "cursor": { "totalRecords": 1 } }
            });
            let page = parse_asset_page(&demo_source(), &serde_json::to_vec(&body).unwrap())
                .unwrap();
            assert_eq!(page.assets.len(), 1);
            assert_eq!(page.assets[0].width, None);
            assert_eq!(page.assets[0].height, None);
        }
    }

    mod state_tests {
        use super::*;

        fn page(records: u64, count: usize) -> CatalogPage {
            CatalogPage {
                assets: (0..count)
                    .map(|i| AssetRecord {
                        url: format!("https://acme-images.imgix.net/img-{i}.png"),
                        origin_path: format!("/img-{i}.png"),
                        file_name: format!("img-{i}.png"),
                        content_type: None,
                        file_size: None,
                        width: None,
                        height: None,
                    })
                    .collect(),
                total_records: records,
            }
        }

        #[test]
        fn test_stale_sequence_detection() {
            let mut state = GalleryState::default();
            let first = state.begin_fetch();
            let second = state.begin_fetch();
            assert!(!state.is_current(first));
            assert!(state.is_current(second));
        }

        #[test]
        fn test_reset_discards_in_flight_fetch() {
            let mut state = GalleryState::default();
            let seq = state.begin_fetch();
            state.reset_for_source();
            assert!(!state.is_current(seq));
            assert!(!state.is_fetching);
        }

        #[test]
        fn test_apply_page_clamps_current_index() {
            let mut state = GalleryState::default();
            state.page.current_index = 5;
            state.apply_page(page(40, 4));
            assert_eq!(state.page.total_page_count, 3);
            assert_eq!(state.page.current_index, 2);
        }

        #[test]
        fn test_no_images_reported_once() {
            let mut state = GalleryState::default();
            state.apply_page(page(0, 0));
            assert!(state.should_report_no_images());
            assert!(!state.should_report_no_images());

            state.reset_for_source();
            state.apply_page(page(0, 0));
            assert!(state.should_report_no_images());
        }

        #[test]
        fn test_empty_filtered_result_not_reported() {
            let mut state = GalleryState::default();
            state.filter = "nothing-matches".to_string();
            state.apply_page(page(0, 0));
            assert!(!state.should_report_no_images());
        }

        #[test]
        fn test_failure_not_reported_as_no_images() {
            let mut state = GalleryState::default();
            let _ = state.begin_fetch();
            state.apply_failure();
            assert!(state.last_fetch_failed);
            assert!(!state.should_report_no_images());
        }
    }
}
