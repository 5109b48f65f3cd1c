//! Board listing parser for eGovFrame `selectBoardList.do` pages.

use std::{collections::HashSet, sync::LazyLock};

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::{HttpClient, dom, error::FetchError, model::NoticeSummary};

const LIST_ENDPOINT: &str = "selectBoardList.do";
const ARTICLE_ENDPOINT: &str = "selectBoardArticle.do";

static ROW_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table tbody tr").expect("Failed to parse row selector"));
static SEQUENCE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("td.td_num2").expect("Failed to parse sequence selector"));
static SUBJECT_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("td.td_subject").expect("Failed to parse subject selector"));
static ONCLICK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("[onclick]").expect("Failed to parse onclick selector"));
static NEW_ICON_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a.new_icon").expect("Failed to parse new icon selector"));
static DEPARTMENT_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("td.td_name").expect("Failed to parse department selector"));
static VIEWS_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("td.td_num").expect("Failed to parse views selector"));
static DATE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("td.td_datetime").expect("Failed to parse date selector"));

// javascript:fn_egov_inqire_notice('BBSMSTR_000000000590', '123456', this);
static ONCLICK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)(?:javascript:\s*)?fn_egov_inqire_notice(?:_mbldn)?\(\s*['"]([^'"]+)['"]\s*,\s*['"]([^'"]+)['"]\s*(?:,\s*this\s*)?\)\s*;?"#,
    )
    .expect("Failed to compile onclick pattern")
});

/// Fetches `list_url` and returns at most `limit` notices, newest first.
#[tracing::instrument(level = tracing::Level::DEBUG, skip(client), fields(list_url = %list_url))]
pub async fn fetch_list(
    client: &HttpClient,
    list_url: &Url,
    limit: usize,
) -> Result<Vec<NoticeSummary>, FetchError> {
    let html = client.get_text(list_url.as_str(), None).await?;
    let notices = parse_list(&html, list_url, limit);
    tracing::debug!(count = notices.len(), "parsed notice list");
    Ok(notices)
}

/// Extracts up to `limit` notices from a listing page. Pinned rows (those
/// whose sequence cell is not a number) and rows without a recognizable
/// click handler or title are skipped; ids are unique within the result.
pub fn parse_list(html: &str, list_url: &Url, limit: usize) -> Vec<NoticeSummary> {
    let document = Html::parse_document(html);
    let mut seen_ids = HashSet::new();
    let mut notices = Vec::new();

    for row in document.select(&ROW_SELECTOR) {
        if notices.len() >= limit {
            break;
        }

        let Some(sequence) = row.select(&SEQUENCE_SELECTOR).next() else {
            continue;
        };
        let sequence = sequence.text().collect::<String>();
        let sequence = sequence.trim();
        if sequence.is_empty() || !sequence.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }

        let Some(subject) = row.select(&SUBJECT_SELECTOR).next() else {
            continue;
        };
        let Some((bbs_id, ntt_id)) = subject_onclick(subject).and_then(parse_onclick) else {
            tracing::debug!(row = sequence, "no article handler in subject cell");
            continue;
        };

        if !seen_ids.insert(ntt_id.to_string()) {
            continue;
        }

        let title = dom::text_nodes(subject, &|el: ElementRef<'_>| {
            NEW_ICON_SELECTOR.matches(&el)
        })
        .join(" ");
        if title.is_empty() {
            continue;
        }

        notices.push(NoticeSummary {
            id: ntt_id.to_string(),
            title,
            url: detail_url(list_url, bbs_id, ntt_id).to_string(),
            department: cell_text(row, &DEPARTMENT_SELECTOR),
            views: cell_text(row, &VIEWS_SELECTOR).and_then(|views| parse_views(&views)),
            date: cell_text(row, &DATE_SELECTOR),
        });
    }

    notices
}

/// Builds the article view URL on the listing's host:
/// `.../selectBoardList.do` becomes `.../selectBoardArticle.do?bbsId=..&nttId=..`.
pub fn detail_url(list_url: &Url, bbs_id: &str, ntt_id: &str) -> Url {
    let mut url = list_url.clone();
    let path = match list_url.path().strip_suffix(LIST_ENDPOINT) {
        Some(prefix) => format!("{prefix}{ARTICLE_ENDPOINT}"),
        None => {
            let dir = list_url
                .path()
                .rsplit_once('/')
                .map_or("", |(dir, _)| dir);
            format!("{dir}/{ARTICLE_ENDPOINT}")
        }
    };
    url.set_path(&path);
    url.set_query(None);
    url.set_fragment(None);
    url.query_pairs_mut()
        .append_pair("bbsId", bbs_id)
        .append_pair("nttId", ntt_id);
    url
}

/// The click handler may sit on the cell itself or on any element inside it.
fn subject_onclick<'a>(subject: ElementRef<'a>) -> Option<&'a str> {
    subject
        .value()
        .attr("onclick")
        .map(str::trim)
        .filter(|onclick| !onclick.is_empty())
        .or_else(|| {
            subject
                .select(&ONCLICK_SELECTOR)
                .next()
                .and_then(|inner| inner.value().attr("onclick"))
                .map(str::trim)
        })
}

fn parse_onclick(onclick: &str) -> Option<(&str, &str)> {
    let captures = ONCLICK_RE.captures(onclick)?;
    Some((captures.get(1)?.as_str(), captures.get(2)?.as_str()))
}

fn cell_text(row: ElementRef<'_>, selector: &Selector) -> Option<String> {
    row.select(selector)
        .next()
        .map(|cell| cell.text().collect::<String>().trim().to_string())
}

fn parse_views(text: &str) -> Option<u64> {
    text.trim().replace(',', "").parse().ok()
}
