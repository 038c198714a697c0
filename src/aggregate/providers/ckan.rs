// src/aggregate/providers/ckan.rs
//! CKAN `package_search` family. The five sites share one response shape and differ only
//! in endpoint, how the subtitle is built, and which link is preferred.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use super::{ensure_success, parse_json, record_normalized, send};
use crate::aggregate::http::{FetchRequest, Fetcher};
use crate::aggregate::normalize::{
    encode_component, first_present, format_updated, join_list, null_as_default,
};
use crate::aggregate::types::{AdapterError, CanonicalListing, ListingProvider, ProviderAdapter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtitleFrom {
    Tags,
    License,
    Groups,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkFrom {
    /// `dataset.url`, else the site's dataset page.
    DatasetUrl,
    /// `resources[0].url`, else the site's dataset page.
    FirstResource,
}

/// Static description of one CKAN deployment.
#[derive(Debug, Clone)]
pub struct CkanSite {
    pub source: &'static str,
    pub api_url: &'static str,
    /// Public site root used to build dataset page links.
    pub site_url: &'static str,
    pub cache_prefix: &'static str,
    pub subtitle: SubtitleFrom,
    pub link: LinkFrom,
}

impl CkanSite {
    pub fn ssen() -> Self {
        Self {
            source: "SSEN",
            api_url: "https://ckan-prod.sse.datopian.com/api/action/package_search",
            site_url: "https://ckan-prod.sse.datopian.com",
            cache_prefix: "ssen",
            subtitle: SubtitleFrom::Tags,
            link: LinkFrom::DatasetUrl,
        }
    }

    pub fn data_gov_uk() -> Self {
        Self {
            source: "data.gov.uk",
            api_url: "https://ckan.publishing.service.gov.uk/api/action/package_search",
            site_url: "https://www.data.gov.uk",
            cache_prefix: "datagovuk",
            subtitle: SubtitleFrom::License,
            link: LinkFrom::FirstResource,
        }
    }

    pub fn london_datastore() -> Self {
        Self {
            source: "London Datastore",
            api_url: "https://data.london.gov.uk/api/action/package_search",
            site_url: "https://data.london.gov.uk",
            cache_prefix: "london-datastore",
            subtitle: SubtitleFrom::License,
            link: LinkFrom::FirstResource,
        }
    }

    pub fn nhsbsa() -> Self {
        Self {
            source: "NHSBSA",
            api_url: "https://opendata.nhsbsa.net/api/3/action/package_search",
            site_url: "https://opendata.nhsbsa.net",
            cache_prefix: "nhsbsa",
            subtitle: SubtitleFrom::License,
            link: LinkFrom::FirstResource,
        }
    }

    pub fn york_open_data() -> Self {
        Self {
            source: "York Open Data",
            api_url: "https://data.yorkopendata.org/api/action/package_search",
            site_url: "https://data.yorkopendata.org",
            cache_prefix: "york-opendata",
            subtitle: SubtitleFrom::Groups,
            link: LinkFrom::DatasetUrl,
        }
    }

    pub fn search_url(&self, query: &str) -> String {
        format!("{}?q={}", self.api_url, encode_component(query))
    }
}

#[derive(Debug, Deserialize)]
struct PackageSearch {
    success: Option<bool>,
    result: Option<PackageResult>,
}

#[derive(Debug, Deserialize)]
struct PackageResult {
    results: Option<Vec<Package>>,
}

#[derive(Debug, Deserialize)]
struct Package {
    #[serde(default, deserialize_with = "null_as_default")]
    id: String,
    name: Option<String>,
    title: Option<String>,
    notes: Option<String>,
    metadata_modified: Option<String>,
    organization: Option<Organization>,
    license_title: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    tags: Vec<Labelled>,
    #[serde(default, deserialize_with = "null_as_default")]
    groups: Vec<Labelled>,
    #[serde(default, deserialize_with = "null_as_default")]
    resources: Vec<Resource>,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Organization {
    title: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Labelled {
    display_name: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Resource {
    url: Option<String>,
}

fn labels(items: Vec<Labelled>) -> String {
    join_list(items.into_iter().filter_map(|l| l.display_name.or(l.name)))
}

pub struct CkanAdapter {
    site: CkanSite,
    fetcher: Arc<dyn Fetcher>,
}

impl CkanAdapter {
    pub fn new(site: CkanSite, fetcher: Arc<dyn Fetcher>) -> Self {
        Self { site, fetcher }
    }

    pub fn site(&self) -> &CkanSite {
        &self.site
    }

    fn normalize(&self, body: &[u8]) -> Result<Vec<CanonicalListing>, AdapterError> {
        let source = self.site.source;
        let data: PackageSearch = parse_json(source, body)?;
        if data.success != Some(true) {
            return Err(AdapterError::shape(source, "success flag not set"));
        }
        let packages = data
            .result
            .and_then(|r| r.results)
            .ok_or_else(|| AdapterError::shape(source, "result.results"))?;

        Ok(packages
            .into_iter()
            .map(|p| self.to_listing(p))
            .collect())
    }

    fn to_listing(&self, p: Package) -> CanonicalListing {
        let site = &self.site;
        let slug = first_present([p.name.as_deref()], || p.id.clone());
        let page = format!("{}/dataset/{}", site.site_url, slug);

        let url = match site.link {
            LinkFrom::DatasetUrl => first_present([p.url.as_deref()], || page),
            LinkFrom::FirstResource => {
                first_present([p.resources.first().and_then(|r| r.url.as_deref())], || page)
            }
        };
        let subtitle = match site.subtitle {
            SubtitleFrom::Tags => labels(p.tags),
            SubtitleFrom::Groups => labels(p.groups),
            SubtitleFrom::License => p.license_title.unwrap_or_default(),
        };
        let (org_title, org_description) = match p.organization {
            Some(o) => (o.title, o.description),
            None => (None, None),
        };

        CanonicalListing {
            title: p.title.unwrap_or_default(),
            description: p.notes.unwrap_or_default(),
            subtitle,
            provider: ListingProvider {
                title: org_title.unwrap_or_default(),
                description: org_description.unwrap_or_default(),
            },
            url,
            source: site.source.to_string(),
            updated: format_updated(p.metadata_modified.as_deref()),
            id: p.id,
        }
    }
}

#[async_trait]
impl ProviderAdapter for CkanAdapter {
    async fn search(&self, query: &str) -> Result<Vec<CanonicalListing>, AdapterError> {
        let source = self.site.source;
        let req = FetchRequest::get(self.site.search_url(query))
            .header("Accept", "application/json")
            .cache_key(format!("{}-{query}", self.site.cache_prefix));
        let resp = send(source, self.fetcher.as_ref(), req).await?;
        ensure_success(source, &resp)?;

        let t0 = std::time::Instant::now();
        let out = self.normalize(&resp.body)?;
        record_normalized(source, t0, out.len());
        Ok(out)
    }

    fn name(&self) -> &'static str {
        self.site.source
    }
}
