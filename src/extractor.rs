use regex::Regex;
use rust_decimal::Decimal;
use scraper::{ElementRef, Html, Selector};
use sha2::{Digest, Sha256};
use tracing::debug;
use url::Url;

use crate::config::WatchTarget;
use crate::models::{Candidate, ListingKind, ListingValue};

// Container patterns tried in order; the first one that matches anything
// wins. Source markup churns, so these favor class substrings over exact
// class names.
const PRODUCT_CONTAINER_SELECTORS: &[&str] = &[
    "[data-test*=product]",
    "div[class*=product]",
    "li[class*=product]",
    "article[class*=card]",
    "div[class*=item]",
];

const JOB_CONTAINER_SELECTORS: &[&str] = &[
    "li[class*=job]",
    "div[class*=job]",
    "article[class*=listing]",
    "div[class*=vacancy]",
    "article",
];

const TITLE_SELECTORS: &[&str] = &[
    "h1", "h2", "h3", "h4",
    "[class*=title]",
    "[class*=name]",
    "a",
];

// Section headers and promo tiles that slip into container matches.
const BOILERPLATE_TITLES: &[&str] = &["new launches", "view all", "shop now", "advert"];

const MIN_TITLE_LEN: usize = 5;
const MIN_DESCRIPTION_LEN: usize = 30;

#[derive(Debug, Default)]
pub struct Extraction {
    pub candidates: Vec<Candidate>,
    /// Containers that looked like listings but had no usable identifier.
    pub skipped: usize,
}

pub struct Extractor {
    price_regex: Regex,
    id_patterns: Vec<Regex>,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor {
    pub fn new() -> Self {
        Extractor {
            price_regex: Regex::new(r"(₹|US\$|\$|£|€)\s*([\d,]+(?:\.\d+)?)").unwrap(),
            id_patterns: vec![
                Regex::new(r"/p/([^/?#]+)").unwrap(),
                Regex::new(r"/product/([^/?#]+)").unwrap(),
                Regex::new(r"/pn/([^/?#]+)").unwrap(),
                Regex::new(r"/pvid/([^/?#]+)").unwrap(),
                Regex::new(r"/jobs?/([^/?#]+)").unwrap(),
                Regex::new(r"[?&]id=([^&#]+)").unwrap(),
            ],
        }
    }

    /// Parse one fetched page into candidates. Each container is handled
    /// independently, so a single malformed card never aborts the rest;
    /// unusable containers are counted, not propagated as errors.
    pub fn extract(&self, html: &str, target: &WatchTarget) -> Extraction {
        let document = Html::parse_document(html);
        let selectors = match target.kind {
            ListingKind::Product => PRODUCT_CONTAINER_SELECTORS,
            ListingKind::Job => JOB_CONTAINER_SELECTORS,
        };

        let containers = collect_containers(&document, selectors);
        debug!(
            target = %target.name,
            containers = containers.len(),
            "parsing listing containers"
        );

        let mut extraction = Extraction::default();
        for container in containers {
            match self.extract_one(container, target) {
                Some(candidate) => extraction.candidates.push(candidate),
                None => extraction.skipped += 1,
            }
        }
        extraction
    }

    fn extract_one(&self, container: ElementRef<'_>, target: &WatchTarget) -> Option<Candidate> {
        let title = container_title(container)?;
        let url = container_url(container, &target.url).unwrap_or_default();

        let id = self
            .listing_id_from_url(&url)
            .unwrap_or_else(|| fallback_id(&title, &target.name));

        let value = match target.kind {
            ListingKind::Product => self.container_price(container),
            ListingKind::Job => container_description(container),
        };

        Some(Candidate {
            id,
            kind: target.kind,
            title,
            category: target.name.clone(),
            url,
            value,
        })
    }

    fn container_price(&self, container: ElementRef<'_>) -> Option<ListingValue> {
        let text = container.text().collect::<Vec<_>>().join(" ");
        let captures = self.price_regex.captures(&text)?;
        let symbol = captures.get(1)?.as_str();
        let amount: Decimal = captures.get(2)?.as_str().replace(',', "").parse().ok()?;
        if amount <= Decimal::ZERO {
            return None;
        }
        Some(ListingValue::Price {
            amount,
            currency: currency_for_symbol(symbol).to_string(),
        })
    }

    pub fn listing_id_from_url(&self, url: &str) -> Option<String> {
        if url.is_empty() {
            return None;
        }
        self.id_patterns
            .iter()
            .find_map(|p| p.captures(url))
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    }
}

fn collect_containers<'a>(document: &'a Html, selectors: &[&str]) -> Vec<ElementRef<'a>> {
    for raw in selectors {
        let Ok(selector) = Selector::parse(raw) else {
            continue;
        };
        let matched: Vec<_> = document.select(&selector).collect();
        if !matched.is_empty() {
            return matched;
        }
    }
    Vec::new()
}

fn container_title(container: ElementRef<'_>) -> Option<String> {
    // Image alt text is the most reliable product name on tile layouts.
    let img_selector = Selector::parse("img[alt]").ok()?;
    let mut title = container
        .select(&img_selector)
        .filter_map(|img| img.value().attr("alt"))
        .map(str::trim)
        .find(|alt| !alt.is_empty())
        .map(str::to_string);

    if title.as_deref().map_or(true, |t| t.len() < MIN_TITLE_LEN) {
        title = TITLE_SELECTORS.iter().find_map(|raw| {
            let selector = Selector::parse(raw).ok()?;
            container
                .select(&selector)
                .map(|el| collapse_whitespace(&el.text().collect::<Vec<_>>().join(" ")))
                .find(|t| t.len() >= MIN_TITLE_LEN)
        });
    }

    let title = collapse_whitespace(&title?);
    if title.len() < MIN_TITLE_LEN {
        return None;
    }
    let lowered = title.to_lowercase();
    if BOILERPLATE_TITLES.iter().any(|b| lowered.contains(b)) {
        return None;
    }
    Some(title)
}

fn container_description(container: ElementRef<'_>) -> Option<ListingValue> {
    let text = collapse_whitespace(&container.text().collect::<Vec<_>>().join(" "));
    if text.len() < MIN_DESCRIPTION_LEN {
        return None;
    }
    Some(ListingValue::Description { text })
}

fn container_url(container: ElementRef<'_>, base: &str) -> Option<String> {
    let anchor_selector = Selector::parse("a[href]").ok()?;
    let href = container
        .select(&anchor_selector)
        .filter_map(|a| a.value().attr("href"))
        .map(str::trim)
        .find(|href| !href.is_empty())?;

    let base_url = Url::parse(base).ok()?;
    base_url.join(href).ok().map(|u| u.to_string())
}

/// Stable identifier for sources that expose no per-item URL: hash of the
/// normalized title and category.
pub fn fallback_id(title: &str, category: &str) -> String {
    let normalized = format!(
        "{}|{}",
        collapse_whitespace(title).to_lowercase(),
        category.to_lowercase()
    );
    let digest = Sha256::digest(normalized.as_bytes());
    let mut id = String::with_capacity(16);
    for byte in digest.iter().take(8) {
        id.push_str(&format!("{:02x}", byte));
    }
    id
}

fn currency_for_symbol(symbol: &str) -> &'static str {
    match symbol {
        "₹" => "INR",
        "£" => "GBP",
        "€" => "EUR",
        _ => "USD",
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
