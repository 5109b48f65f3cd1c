use std::collections::HashSet;

use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tokio::sync::RwLock;
use ycnotice::{
    HttpClient, NoticeDetail, NoticeSummary, Publisher, detail::extension_for_mime,
};

use crate::{
    client::DiscordClient,
    error::DiscordError,
    format,
    model::{AttachmentRef, CreateMessage, Embed, EmbedImage, FileUpload},
};

/// Images attached to one announcement.
pub const MAX_IMAGES: usize = 2;

/// Delivers announcements to Discord channels through the REST API.
#[derive(Debug)]
pub struct DiscordPublisher {
    discord: DiscordClient,
    http: HttpClient,
    known_channels: RwLock<HashSet<u64>>,
}

impl DiscordPublisher {
    pub fn new(discord: DiscordClient, http: HttpClient) -> Self {
        Self {
            discord,
            http,
            known_channels: RwLock::new(HashSet::new()),
        }
    }

    /// Inline images first, then downloaded URL images, up to
    /// [`MAX_IMAGES`]. URL images that fail to download are returned
    /// separately so they can be linked.
    async fn collect_images(
        &self,
        notice: &NoticeSummary,
        detail: &NoticeDetail,
    ) -> (Vec<FileUpload>, Vec<String>) {
        let mut uploads: Vec<FileUpload> = detail
            .image_blobs
            .iter()
            .take(MAX_IMAGES)
            .enumerate()
            .map(|(index, blob)| FileUpload {
                filename: image_filename(index, &blob.extension),
                mime: blob.mime.clone(),
                bytes: blob.bytes.clone(),
            })
            .collect();
        let mut linked = Vec::new();

        for url in detail.images.iter().take(MAX_IMAGES - uploads.len()) {
            match self.http.get_bytes(url, Some(&notice.url)).await {
                Ok((bytes, content_type)) => match image_type(url, content_type.as_deref()) {
                    Some((mime, extension)) => uploads.push(FileUpload {
                        filename: image_filename(uploads.len(), &extension),
                        mime,
                        bytes,
                    }),
                    None => {
                        tracing::warn!(url = %url, ?content_type, "downloaded image is not an image");
                        linked.push(url.clone());
                    }
                },
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "image download failed");
                    linked.push(url.clone());
                }
            }
        }

        (uploads, linked)
    }
}

impl Publisher for DiscordPublisher {
    type Channel = u64;
    type Error = DiscordError;

    async fn resolve_channel(&self, channel_id: u64) -> Result<u64, DiscordError> {
        if self.known_channels.read().await.contains(&channel_id) {
            return Ok(channel_id);
        }
        let channel = self.discord.get_channel(channel_id).await?;
        if !channel.is_messageable() {
            return Err(DiscordError::NotMessageable(channel_id));
        }
        tracing::debug!(channel_id, name = ?channel.name, "resolved channel");
        self.known_channels.write().await.insert(channel_id);
        Ok(channel_id)
    }

    #[tracing::instrument(name = "publish", skip_all, fields(channel = *channel, id = %notice.id))]
    async fn publish(
        &self,
        channel: &u64,
        label: &str,
        notice: &NoticeSummary,
        detail: &NoticeDetail,
    ) -> Result<(), DiscordError> {
        let (uploads, linked) = self.collect_images(notice, detail).await;
        let content = format::notice_message(label, notice, detail, &linked);
        let message = announcement(content, &notice.url, &uploads);
        self.discord
            .create_message(*channel, &message, &uploads)
            .await?;
        Ok(())
    }
}

/// Message with one embed per uploaded image. Embeds share the notice URL so
/// Discord groups them into a single gallery.
pub fn announcement(content: String, notice_url: &str, uploads: &[FileUpload]) -> CreateMessage {
    let timestamp = OffsetDateTime::now_utc().format(&Rfc3339).ok();
    CreateMessage {
        content: Some(content),
        embeds: uploads
            .iter()
            .map(|upload| Embed {
                url: Some(notice_url.to_string()),
                timestamp: timestamp.clone(),
                image: Some(EmbedImage {
                    url: upload.attachment_url(),
                }),
                ..Default::default()
            })
            .collect(),
        attachments: uploads
            .iter()
            .enumerate()
            .map(|(id, upload)| AttachmentRef {
                id,
                filename: upload.filename.clone(),
            })
            .collect(),
        ..Default::default()
    }
}

fn image_filename(index: usize, extension: &str) -> String {
    format!("image{}.{extension}", index + 1)
}

/// MIME type and extension of a downloaded image, from the response
/// `Content-Type` or else from the URL path.
fn image_type(url: &str, content_type: Option<&str>) -> Option<(String, String)> {
    let declared = content_type
        .and_then(|value| value.split(';').next())
        .map(|value| value.trim().to_ascii_lowercase())
        .filter(|mime| mime.starts_with("image/"));
    let mime = match declared {
        Some(mime) => mime,
        None => {
            let path = url.split(['?', '#']).next().unwrap_or(url);
            let guess = mime_guess::from_path(path).first()?;
            if guess.type_() != mime_guess::mime::IMAGE {
                return None;
            }
            guess.essence_str().to_string()
        }
    };
    let extension = extension_for_mime(&mime);
    Some((mime, extension))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_type() {
        assert_eq!(
            image_type("https://a.example/x.bin", Some("image/jpeg; charset=binary")),
            Some(("image/jpeg".to_string(), "jpg".to_string()))
        );
        assert_eq!(
            image_type("https://a.example/upload/poster.PNG?v=2", Some("application/octet-stream")),
            Some(("image/png".to_string(), "png".to_string()))
        );
        assert_eq!(image_type("https://a.example/view.do", Some("text/html")), None);
        assert_eq!(image_type("https://a.example/download", None), None);
    }

    #[test]
    fn test_announcement_binds_uploads_to_embeds() {
        let uploads = vec![
            FileUpload {
                filename: image_filename(0, "png"),
                mime: "image/png".to_string(),
                bytes: vec![0x89],
            },
            FileUpload {
                filename: image_filename(1, "jpg"),
                mime: "image/jpeg".to_string(),
                bytes: vec![0xff],
            },
        ];
        let message = announcement("본문".to_string(), "https://a.example/view.do", &uploads);
        let value = serde_json::to_value(&message).unwrap();

        assert_eq!(value["content"], "본문");
        assert_eq!(value["attachments"][0]["id"], 0);
        assert_eq!(value["attachments"][1]["filename"], "image2.jpg");
        assert_eq!(value["embeds"][0]["image"]["url"], "attachment://image1.png");
        assert_eq!(value["embeds"][1]["image"]["url"], "attachment://image2.jpg");
        assert_eq!(value["embeds"][1]["url"], "https://a.example/view.do");
    }

    #[test]
    fn test_announcement_without_images_is_text_only() {
        let message = announcement("본문".to_string(), "https://a.example/view.do", &[]);
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            serde_json::json!({ "content": "본문" })
        );
    }

    #[tokio::test]
    async fn test_blobs_come_first_and_need_no_download() {
        let publisher = DiscordPublisher::new(
            DiscordClient::new("token").unwrap(),
            HttpClient::new().unwrap(),
        );
        let detail = NoticeDetail {
            image_blobs: vec![
                ycnotice::ImageBlob {
                    mime: "image/png".to_string(),
                    extension: "png".to_string(),
                    bytes: vec![1],
                },
                ycnotice::ImageBlob {
                    mime: "image/gif".to_string(),
                    extension: "gif".to_string(),
                    bytes: vec![2],
                },
            ],
            images: vec!["http://127.0.0.1:9/never-fetched.png".to_string()],
            ..Default::default()
        };
        let notice = NoticeSummary {
            id: "1".to_string(),
            title: "t".to_string(),
            url: "https://a.example/view.do".to_string(),
            department: None,
            views: None,
            date: None,
        };

        let (uploads, linked) = publisher.collect_images(&notice, &detail).await;
        let names: Vec<_> = uploads.iter().map(|u| u.filename.as_str()).collect();
        assert_eq!(names, ["image1.png", "image2.gif"]);
        assert!(linked.is_empty());
    }
}
