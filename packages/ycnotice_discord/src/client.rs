use std::time::Duration;

use reqwest::{
    Method, RequestBuilder, StatusCode,
    header::{AUTHORIZATION, CONTENT_LENGTH, HeaderValue},
    multipart::{Form, Part},
};
use serde::{Deserialize, de::DeserializeOwned};

use crate::{
    error::DiscordError,
    model::{Channel, CreateMessage, FileUpload, Member, Message},
};

const MAX_ATTEMPTS: u8 = 3;
const MAX_RETRY_AFTER_SECS: f64 = 60.0;

/// Bot-token REST client. Retries a request when Discord answers 429.
#[derive(Clone)]
pub struct DiscordClient {
    http: reqwest::Client,
    token: String,
    base_url: String,
}

impl DiscordClient {
    pub const API_BASE: &'static str = "https://discord.com/api/v10";
    const USER_AGENT: &'static str =
        concat!("DiscordBot (ycnotice, ", env!("CARGO_PKG_VERSION"), ")");
    const TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(token: impl Into<String>) -> Result<Self, DiscordError> {
        let http = reqwest::Client::builder()
            .user_agent(Self::USER_AGENT)
            .timeout(Self::TIMEOUT)
            .build()
            .map_err(DiscordError::Client)?;
        Ok(Self {
            http,
            token: token.into(),
            base_url: Self::API_BASE.to_string(),
        })
    }

    pub async fn get_channel(&self, channel_id: u64) -> Result<Channel, DiscordError> {
        let path = format!("/channels/{channel_id}");
        let response = self.execute(Method::GET, &path, |request| Ok(request)).await?;
        decode(response, &path).await
    }

    /// Posts a message. With `files`, the body is sent as multipart with the
    /// message as `payload_json` and each file as `files[i]`.
    pub async fn create_message(
        &self,
        channel_id: u64,
        message: &CreateMessage,
        files: &[FileUpload],
    ) -> Result<Message, DiscordError> {
        let path = format!("/channels/{channel_id}/messages");
        let response = if files.is_empty() {
            self.execute(Method::POST, &path, |request| Ok(request.json(message)))
                .await?
        } else {
            let payload = serde_json::to_string(message)?;
            self.execute(Method::POST, &path, |request| {
                Ok(request.multipart(multipart_form(&payload, files)?))
            })
            .await?
        };
        decode(response, &path).await
    }

    pub async fn edit_message(
        &self,
        channel_id: u64,
        message_id: u64,
        message: &CreateMessage,
    ) -> Result<Message, DiscordError> {
        let path = format!("/channels/{channel_id}/messages/{message_id}");
        let response = self
            .execute(Method::PATCH, &path, |request| Ok(request.json(message)))
            .await?;
        decode(response, &path).await
    }

    pub async fn get_member(&self, guild_id: u64, user_id: u64) -> Result<Member, DiscordError> {
        let path = format!("/guilds/{guild_id}/members/{user_id}");
        let response = self.execute(Method::GET, &path, |request| Ok(request)).await?;
        decode(response, &path).await
    }

    pub async fn add_member_role(
        &self,
        guild_id: u64,
        user_id: u64,
        role_id: u64,
    ) -> Result<(), DiscordError> {
        let path = format!("/guilds/{guild_id}/members/{user_id}/roles/{role_id}");
        self.execute(Method::PUT, &path, |request| {
            Ok(request.header(CONTENT_LENGTH, HeaderValue::from_static("0")))
        })
        .await?;
        Ok(())
    }

    pub async fn remove_member_role(
        &self,
        guild_id: u64,
        user_id: u64,
        role_id: u64,
    ) -> Result<(), DiscordError> {
        let path = format!("/guilds/{guild_id}/members/{user_id}/roles/{role_id}");
        self.execute(Method::DELETE, &path, |request| Ok(request))
            .await?;
        Ok(())
    }

    async fn execute<F>(
        &self,
        method: Method,
        path: &str,
        prepare: F,
    ) -> Result<reqwest::Response, DiscordError>
    where
        F: Fn(RequestBuilder) -> Result<RequestBuilder, DiscordError> + Send + Sync,
    {
        let url = format!("{}{}", self.base_url, path);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let request = prepare(
                self.http
                    .request(method.clone(), &url)
                    .header(AUTHORIZATION, format!("Bot {}", self.token)),
            )?;
            let response = request
                .send()
                .await
                .map_err(|e| DiscordError::request(path, e))?;

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS && attempt < MAX_ATTEMPTS {
                let wait = retry_after(response).await;
                tracing::warn!(path, attempt, ?wait, "rate limited by Discord");
                tokio::time::sleep(wait).await;
                continue;
            }
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(DiscordError::Status {
                    path: path.to_string(),
                    status,
                    body,
                });
            }
            tracing::debug!(%method, path, %status, "Discord request");
            return Ok(response);
        }
    }
}

impl std::fmt::Debug for DiscordClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

fn multipart_form(payload: &str, files: &[FileUpload]) -> Result<Form, DiscordError> {
    let mut form = Form::new().text("payload_json", payload.to_string());
    for (index, file) in files.iter().enumerate() {
        let part = Part::bytes(file.bytes.clone())
            .file_name(file.filename.clone())
            .mime_str(&file.mime)
            .map_err(|e| DiscordError::request(&file.filename, e))?;
        form = form.part(format!("files[{index}]"), part);
    }
    Ok(form)
}

async fn decode<T: DeserializeOwned>(
    response: reqwest::Response,
    path: &str,
) -> Result<T, DiscordError> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| DiscordError::request(path, e))?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[derive(Deserialize)]
struct RateLimited {
    retry_after: f64,
}

async fn retry_after(response: reqwest::Response) -> Duration {
    let header = response
        .headers()
        .get("retry-after")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<f64>().ok());
    let body = response
        .json::<RateLimited>()
        .await
        .ok()
        .map(|limited| limited.retry_after);
    let secs = body.or(header).filter(|secs| secs.is_finite()).unwrap_or(1.0);
    Duration::from_secs_f64(secs.clamp(0.0, MAX_RETRY_AFTER_SECS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multipart_rejects_bad_mime() {
        let files = [FileUpload {
            filename: "image1.png".to_string(),
            mime: "not a mime".to_string(),
            bytes: vec![1, 2, 3],
        }];
        assert!(multipart_form("{}", &files).is_err());
    }

    #[test]
    fn test_debug_hides_token() {
        let client = DiscordClient::new("secret-token").unwrap();
        assert!(!format!("{client:?}").contains("secret-token"));
    }
}
