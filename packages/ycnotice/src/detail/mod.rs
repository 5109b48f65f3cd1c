//! Detail page extraction.
//!
//! The page is parsed once and every pass below reads the same immutable
//! tree. Noise and table subtrees are excluded from the text pass by a skip
//! predicate instead of being removed from the document.

mod media;
mod table;
mod text;

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::{
    client::HttpClient,
    error::{FetchError, ParseAnomaly},
    model::NoticeDetail,
};

pub use media::{decode_data_image, download_url, extension_for_mime};
pub use table::Grid;
pub use text::{clean_text, is_noisy_text, normalize_broken_text};

const TABLE_HEADING: &str = "[일정]";

static WRAPPER_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".view_wrap").expect("Failed to parse wrapper selector"));
static BODY_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("body").expect("Failed to parse body selector"));
static NOISE_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(".view_subject, .meta, script, style, noscript")
        .expect("Failed to parse noise selector")
});
static TABLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table").expect("Failed to parse table selector"));

fn is_noise(el: ElementRef<'_>) -> bool {
    NOISE_SELECTOR.matches(&el)
}

fn is_noise_or_table(el: ElementRef<'_>) -> bool {
    is_noise(el) || el.value().name() == "table"
}

/// Fetches a detail page and extracts its content.
#[tracing::instrument(skip(client))]
pub async fn fetch_detail(client: &HttpClient, url: &str) -> Result<NoticeDetail, FetchError> {
    let detail_url = Url::parse(url).map_err(|e| FetchError::invalid_url(url, e))?;
    let html = client.get_text(url, Some(url)).await?;
    Ok(parse_detail(&html, &detail_url))
}

/// Extracts body text, images and attachments from a detail page.
///
/// Never fails: a page without a recognizable container yields an empty
/// [`NoticeDetail`].
pub fn parse_detail(html: &str, detail_url: &Url) -> NoticeDetail {
    let document = Html::parse_document(html);

    let Some(root) = content_root(&document) else {
        tracing::debug!(url = %detail_url, anomaly = %ParseAnomaly::MissingContainer, "empty detail");
        return NoticeDetail::default();
    };

    let tables: Vec<String> = root
        .select(&TABLE_SELECTOR)
        .filter(|table| !is_noise(*table))
        .filter(|table| !crate::dom::has_ancestor_below(*table, root, is_noise_or_table))
        .map(|table| Grid::from_table(table, &is_noise))
        .filter(|grid| !grid.is_empty())
        .map(|grid| grid.render())
        .collect();

    let body = text::extract_body_text(root, &is_noise_or_table);
    let images = media::extract_images(root, detail_url, &is_noise);
    let files = media::extract_files(&document, detail_url);

    NoticeDetail {
        text: append_tables(body, &tables),
        images: images.urls,
        image_blobs: images.blobs,
        files,
    }
}

/// The content wrapper, else a non-empty `body`.
fn content_root(document: &Html) -> Option<ElementRef<'_>> {
    document.select(&WRAPPER_SELECTOR).next().or_else(|| {
        document
            .select(&BODY_SELECTOR)
            .next()
            .filter(|body| body.children().next().is_some())
    })
}

fn append_tables(body: String, tables: &[String]) -> String {
    if tables.is_empty() {
        return body;
    }
    let section = format!("{TABLE_HEADING}\n{}", tables.join("\n\n"));
    if body.is_empty() {
        section
    } else {
        format!("{body}\n\n{section}")
    }
}
