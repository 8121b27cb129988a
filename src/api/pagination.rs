//! Paginated listing walker.
//!
//! The backend serves listings in several shapes: a bare array, a
//! `results`/`next` envelope whose `results` is an array or a GeoJSON
//! FeatureCollection, or a single GeoJSON Feature. [`collect_all_pages`]
//! follows `next` links to the end and hands back one flat, ordered list
//! of [`Record`]s.
//!
//! Results are best effort: a failed page ends the walk and whatever was
//! collected before it is returned. [`PageWalk::end`] tells the caller why
//! the walk stopped.

use crate::api::error::FetchError;
use crate::models::Record;
use indicatif::ProgressBar;
use reqwest::Url;
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use tracing::{debug, error, info, warn};

/// Something that can fetch one page of JSON by address.
pub trait PageSource {
    fn fetch_page(&self, url: &str) -> impl Future<Output = Result<Value, FetchError>> + Send;
}

/// Why a walk stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkEnd {
    /// An envelope page had no `next` link.
    Exhausted,
    /// The body was a bare array or a single Feature.
    SinglePage,
    /// The body had a shape the walker does not know.
    UnrecognizedShape,
    /// A page failed to fetch or decode.
    Failed(String),
    /// `next` pointed back to an address already fetched.
    Cycle(String),
}

impl fmt::Display for WalkEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WalkEnd::Exhausted => write!(f, "all pages read"),
            WalkEnd::SinglePage => write!(f, "single page"),
            WalkEnd::UnrecognizedShape => write!(f, "unexpected response format"),
            WalkEnd::Failed(reason) => write!(f, "page failed: {}", reason),
            WalkEnd::Cycle(url) => write!(f, "next link loops back to {}", url),
        }
    }
}

/// Outcome of walking a listing.
#[derive(Debug, Clone)]
pub struct PageWalk {
    /// Records in server order.
    pub records: Vec<Record>,
    /// Number of fetch attempts made.
    pub pages_fetched: usize,
    pub end: WalkEnd,
}

impl PageWalk {
    /// True when the listing was read to its natural end.
    pub fn is_complete(&self) -> bool {
        matches!(self.end, WalkEnd::Exhausted | WalkEnd::SinglePage)
    }
}

/// One decoded page.
#[derive(Debug, PartialEq)]
enum Page {
    /// Envelope page; keep going if `next` is set.
    Envelope { items: Vec<Value>, next: Option<String> },
    /// Unpaginated body; stop after this.
    Single(Vec<Value>),
    Unrecognized,
}

fn classify_page(body: Value) -> Page {
    let next = body
        .get("next")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    match body {
        Value::Object(mut object) => {
            match object.get_mut("results") {
                Some(results)
                    if results.get("type").and_then(Value::as_str) == Some("FeatureCollection") =>
                {
                    let items = match results.get_mut("features").map(Value::take) {
                        Some(Value::Array(features)) => features,
                        _ => Vec::new(),
                    };
                    return Page::Envelope { items, next };
                }
                Some(Value::Array(items)) => {
                    return Page::Envelope {
                        items: std::mem::take(items),
                        next,
                    }
                }
                _ => {}
            }

            if object.get("type").and_then(Value::as_str) == Some("Feature") {
                Page::Single(vec![Value::Object(object)])
            } else {
                Page::Unrecognized
            }
        }
        Value::Array(items) => Page::Single(items),
        _ => Page::Unrecognized,
    }
}

/// Normalize a single, unpaginated response body into records.
///
/// Accepts every listing shape plus a top-level FeatureCollection; the
/// `next` link, if any, is ignored. Unknown shapes yield nothing.
pub fn records_from_body(body: Value) -> Vec<Record> {
    let items = match body {
        Value::Object(mut object)
            if !object.contains_key("results")
                && object.get("type").and_then(Value::as_str) == Some("FeatureCollection") =>
        {
            match object.remove("features") {
                Some(Value::Array(features)) => features,
                _ => Vec::new(),
            }
        }
        body => match classify_page(body) {
            Page::Envelope { items, .. } | Page::Single(items) => items,
            Page::Unrecognized => {
                warn!("Unexpected response format; treating as empty");
                Vec::new()
            }
        },
    };

    let mut records = Vec::with_capacity(items.len());
    push_records(&mut records, items);
    records
}

/// Resolve a `next` link against the page it came from.
fn resolve_next(current: &str, next: &str) -> String {
    match Url::parse(current).and_then(|base| base.join(next)) {
        Ok(url) => url.to_string(),
        Err(_) => next.to_string(),
    }
}

fn item_kind(item: &Value) -> &'static str {
    match item {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn push_records(records: &mut Vec<Record>, items: Vec<Value>) {
    for item in items {
        let kind = item_kind(&item);
        match Record::from_value(item) {
            Some(record) => records.push(record),
            None => warn!("Skipping non-object listing item ({})", kind),
        }
    }
}

/// Walk every page, ticking `progress` after each one.
pub async fn collect_all_pages<S: PageSource>(
    source: &S,
    first_url: &str,
    progress: Option<&ProgressBar>,
) -> PageWalk {
    let mut records = Vec::new();
    let mut pages_fetched = 0;
    let mut visited: HashSet<String> = HashSet::new();
    let mut url = first_url.to_string();

    let end = loop {
        visited.insert(url.clone());
        pages_fetched += 1;
        debug!("Fetching page {}: {}", pages_fetched, url);

        let body = match source.fetch_page(&url).await {
            Ok(body) => body,
            Err(e) => {
                error!("Error fetching page {}: {}", pages_fetched, e);
                break WalkEnd::Failed(e.to_string());
            }
        };

        let next = match classify_page(body) {
            Page::Envelope { items, next } => {
                push_records(&mut records, items);
                next
            }
            Page::Single(items) => {
                push_records(&mut records, items);
                break WalkEnd::SinglePage;
            }
            Page::Unrecognized => {
                warn!("Unexpected API format at {}; stopping pagination", url);
                break WalkEnd::UnrecognizedShape;
            }
        };

        if let Some(pb) = progress {
            pb.set_message(format!(
                "page {} ({} records)",
                pages_fetched,
                records.len()
            ));
            pb.tick();
        }

        let Some(next) = next else {
            break WalkEnd::Exhausted;
        };

        let next = resolve_next(&url, &next);
        if visited.contains(&next) {
            warn!("Pagination loops back to {}; stopping", next);
            break WalkEnd::Cycle(next);
        }
        url = next;
    };

    info!(
        "Collected {} records from {} page(s)",
        records.len(),
        pages_fetched
    );

    PageWalk {
        records,
        pages_fetched,
        end,
    }
}
