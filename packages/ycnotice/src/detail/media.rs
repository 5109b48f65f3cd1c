use std::sync::LazyLock;

use base64::{
    Engine as _,
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};
use indexmap::IndexSet;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::{error::ParseAnomaly, model::ImageBlob};

const DOWNLOAD_ENDPOINT: &str = "/cmm/fms/FileDown.do";

static IMG_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("img[src]").expect("Failed to parse img selector"));
static FILE_BOX_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".board_file").expect("Failed to parse file box selector"));
static FILE_LINK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("Failed to parse file link selector"));
static ONCLICK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("[onclick]").expect("Failed to parse onclick selector"));

static DATA_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^data:(image/[a-zA-Z0-9.+-]+);base64,(.+)$")
        .expect("Failed to compile data URL pattern")
});
static DOWN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)fn_egov_downFile\(\s*'([^']+)'\s*,\s*'([^']+)'\s*\)")
        .expect("Failed to compile download pattern")
});

/// Accepts payloads with or without trailing padding.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Image references and embedded image payloads found under `root`.
#[derive(Debug, Default)]
pub(crate) struct Images {
    pub urls: Vec<String>,
    pub blobs: Vec<ImageBlob>,
}

pub(crate) fn extract_images<'a, F>(root: ElementRef<'a>, base: &Url, skip: &F) -> Images
where
    F: Fn(ElementRef<'a>) -> bool,
{
    let mut urls = IndexSet::new();
    let mut blobs = Vec::new();

    for img in root.select(&IMG_SELECTOR) {
        if skip(img) || crate::dom::has_ancestor_below(img, root, skip) {
            continue;
        }
        let Some(src) = img.attr("src").map(str::trim).filter(|src| !src.is_empty()) else {
            continue;
        };

        if src.get(..5).is_some_and(|scheme| scheme.eq_ignore_ascii_case("data:")) {
            match decode_data_image(src) {
                Ok(blob) => blobs.push(blob),
                Err(e) => tracing::debug!(error = %e, "skipping embedded image"),
            }
            continue;
        }

        match base.join(src) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {
                urls.insert(url.to_string());
            }
            Ok(url) => tracing::debug!(%url, "skipping non-web image source"),
            Err(e) => tracing::debug!(src, error = %e, "skipping unresolvable image source"),
        }
    }

    Images {
        urls: urls.into_iter().collect(),
        blobs,
    }
}

/// Decodes a `data:image/<subtype>;base64,<payload>` URL.
pub fn decode_data_image(data_url: &str) -> Result<ImageBlob, ParseAnomaly> {
    let caps = DATA_URL_RE
        .captures(data_url.trim())
        .ok_or(ParseAnomaly::InvalidDataUrl)?;
    let mime = caps[1].to_string();
    let payload: String = caps[2].chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = LENIENT.decode(payload)?;

    Ok(ImageBlob {
        extension: extension_for_mime(&mime),
        mime,
        bytes,
    })
}

/// File extension for an image MIME type: `image/jpeg` is `jpg`, otherwise
/// the subtype without any `+suffix`.
pub fn extension_for_mime(mime: &str) -> String {
    let subtype = mime.rsplit('/').next().unwrap_or(mime);
    let subtype = subtype.split('+').next().unwrap_or(subtype).to_ascii_lowercase();
    match subtype.as_str() {
        "jpeg" | "pjpeg" => "jpg".to_string(),
        _ => subtype,
    }
}

/// Attachment links from the file box, wherever it sits in the document.
pub(crate) fn extract_files(document: &Html, base: &Url) -> Vec<String> {
    let Some(file_box) = document.select(&FILE_BOX_SELECTOR).next() else {
        return Vec::new();
    };
    let mut files = IndexSet::new();

    for link in file_box.select(&FILE_LINK_SELECTOR) {
        let href = link.attr("href").unwrap_or_default().trim();
        if href.is_empty() || href.starts_with('#') {
            continue;
        }
        if href
            .get(..11)
            .is_some_and(|scheme| scheme.eq_ignore_ascii_case("javascript:"))
        {
            if let Some(url) = download_trigger(href, base) {
                files.insert(url.to_string());
            }
            continue;
        }
        match base.join(href) {
            Ok(url) => {
                files.insert(url.to_string());
            }
            Err(e) => tracing::debug!(href, error = %e, "skipping unresolvable attachment"),
        }
    }

    for element in file_box.select(&ONCLICK_SELECTOR) {
        if let Some(url) = element
            .attr("onclick")
            .and_then(|onclick| download_trigger(onclick, base))
        {
            files.insert(url.to_string());
        }
    }

    files.into_iter().collect()
}

fn download_trigger(script: &str, base: &Url) -> Option<Url> {
    let caps = DOWN_RE.captures(script)?;
    Some(download_url(base, &caps[1], &caps[2]))
}

/// Direct download URL for an attachment on the same origin as `page`.
pub fn download_url(page: &Url, atch_file_id: &str, file_sn: &str) -> Url {
    let mut url = page.clone();
    url.set_path(DOWNLOAD_ENDPOINT);
    url.set_fragment(None);
    url.query_pairs_mut()
        .clear()
        .append_pair("atchFileId", atch_file_id)
        .append_pair("fileSn", file_sn);
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> Url {
        Url::parse("https://site.example/path/view.do?bbsId=B&nttId=1").unwrap()
    }

    #[test]
    fn test_download_url() {
        let url = download_url(&Url::parse("https://site.example/path/view.do").unwrap(), "FILE123", "2");
        assert_eq!(
            url.as_str(),
            "https://site.example/cmm/fms/FileDown.do?atchFileId=FILE123&fileSn=2"
        );
    }

    #[test]
    fn test_decode_data_image() {
        // "hello" with a line break in the payload and the padding dropped
        let blob = decode_data_image("data:image/jpeg;base64,aGVs\n bG8").unwrap();
        assert_eq!(blob.mime, "image/jpeg");
        assert_eq!(blob.extension, "jpg");
        assert_eq!(blob.bytes, b"hello");
    }

    #[test]
    fn test_decode_data_image_rejects() {
        assert_eq!(
            decode_data_image("data:text/plain;base64,aGVsbG8=").unwrap_err(),
            ParseAnomaly::InvalidDataUrl
        );
        assert!(matches!(
            decode_data_image("data:image/png;base64,@@@@"),
            Err(ParseAnomaly::Base64(_))
        ));
    }

    #[test]
    fn test_extension_for_mime() {
        assert_eq!(extension_for_mime("image/png"), "png");
        assert_eq!(extension_for_mime("image/JPEG"), "jpg");
        assert_eq!(extension_for_mime("image/svg+xml"), "svg");
    }

    #[test]
    fn test_extract_images_classifies_sources() {
        let document = Html::parse_document(
            r#"<div class="view_wrap">
                <img src="/upload/a.png">
                <img src="b.jpg">
                <img src="/upload/a.png">
                <img src="../upload/./a.png">
                <img src="   ">
                <img src="file:///C:/Users/x/a.png">
                <img src="data:image/png;base64,iVBORw0KGgo=">
                <img src="data:image/png;base64,!!">
                <div class="meta"><img src="/hidden.png"></div>
            </div>"#,
        );
        let root = document.root_element();
        let skip = |el: ElementRef<'_>| el.value().classes().any(|c| c == "meta");
        let images = extract_images(root, &page(), &skip);

        assert_eq!(
            images.urls,
            vec![
                "https://site.example/upload/a.png".to_string(),
                "https://site.example/path/b.jpg".to_string(),
            ]
        );
        assert_eq!(images.blobs.len(), 1);
        assert_eq!(images.blobs[0].extension, "png");
        assert_eq!(images.blobs[0].bytes, b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn test_extract_files() {
        let document = Html::parse_document(
            r##"<div class="view_wrap">본문</div>
            <div class="board_file">
                <a href="javascript:fn_egov_downFile('FILE_1','0');">신청서.hwp</a>
                <a href="#" onclick="fn_egov_downFile('FILE_1', '1'); return false;">요강.pdf</a>
                <a href="JavaScript:FN_EGOV_DOWNFILE('FILE_1','0')">중복</a>
                <a href="/files/guide.pdf">안내.pdf</a>
                <a href="javascript:void(0)">없음</a>
            </div>"##,
        );
        let files = extract_files(&document, &page());
        assert_eq!(
            files,
            vec![
                "https://site.example/cmm/fms/FileDown.do?atchFileId=FILE_1&fileSn=0".to_string(),
                "https://site.example/files/guide.pdf".to_string(),
                "https://site.example/cmm/fms/FileDown.do?atchFileId=FILE_1&fileSn=1".to_string(),
            ]
        );
    }

    #[test]
    fn test_extract_files_without_file_box() {
        let document = Html::parse_document("<div class=\"view_wrap\">본문</div>");
        assert!(extract_files(&document, &page()).is_empty());
    }
}
