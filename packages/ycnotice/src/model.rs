use serde::Serialize;

/// One row of a board listing, newest first in the list it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoticeSummary {
    /// Board article id (`nttId`).
    pub id: String,
    pub title: String,
    /// Absolute URL of the article view page.
    pub url: String,
    pub department: Option<String>,
    pub views: Option<u64>,
    pub date: Option<String>,
}

/// An image that was embedded in the page as a base64 data URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageBlob {
    pub mime: String,
    pub extension: String,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

/// Normalized content of one detail page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NoticeDetail {
    pub text: String,
    /// Absolute image URLs, deduplicated in first-seen order.
    pub images: Vec<String>,
    pub image_blobs: Vec<ImageBlob>,
    /// Attachment download URLs, deduplicated in first-seen order.
    pub files: Vec<String>,
}

impl NoticeDetail {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
            && self.images.is_empty()
            && self.image_blobs.is_empty()
            && self.files.is_empty()
    }
}
