use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use tokio::time::MissedTickBehavior;
use url::Url;

use crate::{
    client::HttpClient,
    error::FetchError,
    model::{NoticeDetail, NoticeSummary},
    state::StateStore,
};

/// Where notices come from.
pub trait NoticeSource: Send + Sync {
    fn fetch_list(
        &self,
        list_url: &Url,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<NoticeSummary>, FetchError>> + Send;

    fn fetch_detail(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<NoticeDetail, FetchError>> + Send;
}

impl NoticeSource for HttpClient {
    async fn fetch_list(
        &self,
        list_url: &Url,
        limit: usize,
    ) -> Result<Vec<NoticeSummary>, FetchError> {
        crate::list::fetch_list(self, list_url, limit).await
    }

    async fn fetch_detail(&self, url: &str) -> Result<NoticeDetail, FetchError> {
        crate::detail::fetch_detail(self, url).await
    }
}

/// Where notices go.
pub trait Publisher: Send + Sync {
    type Channel: Send + Sync;
    type Error: std::error::Error + Send + Sync + 'static;

    fn resolve_channel(
        &self,
        channel_id: u64,
    ) -> impl Future<Output = Result<Self::Channel, Self::Error>> + Send;

    fn publish(
        &self,
        channel: &Self::Channel,
        label: &str,
        notice: &NoticeSummary,
        detail: &NoticeDetail,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// One monitored board and the channel it is announced to.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Key of the last seen id in the state file.
    pub state_key: String,
    pub list_url: Url,
    pub channel_id: u64,
    /// First line of every announcement.
    pub label: String,
    pub limit: usize,
}

impl FeedConfig {
    pub const SCHOOL_STATE_KEY: &'static str = "last_school_notice_id";
    pub const DEPT_STATE_KEY: &'static str = "last_dept_notice_id";
    pub const SCHOOL_LABEL: &'static str = "📢 새 학교 공지";
    pub const DEPT_LABEL: &'static str = "📢 새 학과 공지";
    pub const DEFAULT_LIMIT: usize = 10;

    pub fn school(list_url: Url, channel_id: u64) -> Self {
        Self {
            state_key: Self::SCHOOL_STATE_KEY.to_string(),
            list_url,
            channel_id,
            label: Self::SCHOOL_LABEL.to_string(),
            limit: Self::DEFAULT_LIMIT,
        }
    }

    pub fn dept(list_url: Url, channel_id: u64) -> Self {
        Self {
            state_key: Self::DEPT_STATE_KEY.to_string(),
            list_url,
            channel_id,
            label: Self::DEPT_LABEL.to_string(),
            limit: Self::DEFAULT_LIMIT,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The previous tick of this feed was still running.
    Skipped,
    ChannelUnavailable,
    ListUnavailable,
    NoUpdates,
    /// `count` announcements were delivered.
    Published { count: usize },
}

/// Items of `list` (newest first) that come after `last_seen`.
///
/// Without a last seen id only the newest item counts as new. An id that is
/// no longer in the list makes the whole list new.
pub fn select_new<'a>(list: &'a [NoticeSummary], last_seen: Option<&str>) -> &'a [NoticeSummary] {
    let Some(last_seen) = last_seen else {
        return &list[..list.len().min(1)];
    };
    let end = list
        .iter()
        .position(|notice| notice.id == last_seen)
        .unwrap_or(list.len());
    &list[..end]
}

pub struct Watcher<S, P> {
    feed: FeedConfig,
    source: Arc<S>,
    publisher: Arc<P>,
    state: Arc<StateStore>,
    in_flight: AtomicBool,
}

struct FlightGuard<'a>(&'a AtomicBool);

impl<'a> FlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<S: NoticeSource, P: Publisher> Watcher<S, P> {
    pub fn new(feed: FeedConfig, source: Arc<S>, publisher: Arc<P>, state: Arc<StateStore>) -> Self {
        Self {
            feed,
            source,
            publisher,
            state,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Polls the feed once and announces everything new, oldest first.
    #[tracing::instrument(name = "tick", skip(self), fields(feed = %self.feed.state_key))]
    pub async fn tick(&self) -> TickOutcome {
        let Some(_guard) = FlightGuard::acquire(&self.in_flight) else {
            tracing::debug!("previous tick still running");
            return TickOutcome::Skipped;
        };

        let channel = match self.publisher.resolve_channel(self.feed.channel_id).await {
            Ok(channel) => channel,
            Err(e) => {
                tracing::warn!(channel = self.feed.channel_id, error = %e, "channel unavailable");
                return TickOutcome::ChannelUnavailable;
            }
        };

        let last_seen = self.state.load(&self.feed.state_key).await;

        let list = match self
            .source
            .fetch_list(&self.feed.list_url, self.feed.limit)
            .await
        {
            Ok(list) => list,
            Err(e) => {
                tracing::warn!(url = %self.feed.list_url, timeout = e.is_timeout(), error = %e, "list fetch failed");
                return TickOutcome::ListUnavailable;
            }
        };

        let fresh = select_new(&list, last_seen.as_deref());
        let Some(newest) = fresh.first() else {
            tracing::debug!(?last_seen, "no new notices");
            return TickOutcome::NoUpdates;
        };
        tracing::info!(count = fresh.len(), "new notices");

        let mut count = 0;
        for notice in fresh.iter().rev() {
            let detail = match self.source.fetch_detail(&notice.url).await {
                Ok(detail) => detail,
                Err(e) => {
                    tracing::warn!(id = %notice.id, error = %e, "detail fetch failed, announcing without body");
                    NoticeDetail::default()
                }
            };

            match self
                .publisher
                .publish(&channel, &self.feed.label, notice, &detail)
                .await
            {
                Ok(()) => {
                    count += 1;
                    tracing::info!(
                        target: "notice_published",
                        feed = %self.feed.state_key,
                        id = %notice.id,
                        title = %notice.title,
                        url = %notice.url,
                        images = detail.images.len() + detail.image_blobs.len(),
                        files = detail.files.len(),
                        "notice published"
                    );
                }
                Err(e) => tracing::error!(id = %notice.id, error = %e, "failed to publish notice"),
            }
        }

        if let Err(e) = self.state.save(&self.feed.state_key, &newest.id).await {
            tracing::error!(error = %e, "failed to persist last seen id");
        }
        TickOutcome::Published { count }
    }

    /// Ticks forever every `period`, the first tick immediately.
    pub async fn run(&self, period: Duration) {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let outcome = self.tick().await;
            tracing::debug!(feed = %self.feed.state_key, ?outcome, "tick finished");
        }
    }
}
