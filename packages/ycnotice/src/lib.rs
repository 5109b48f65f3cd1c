pub mod client;
pub mod detail;
mod dom;
pub mod error;
pub mod list;
pub mod model;
pub mod state;
pub mod watcher;

pub use client::HttpClient;
pub use detail::{fetch_detail, parse_detail};
pub use list::{fetch_list, parse_list};
pub use model::{ImageBlob, NoticeDetail, NoticeSummary};
pub use state::StateStore;
pub use watcher::{FeedConfig, NoticeSource, Publisher, TickOutcome, Watcher};

pub use error::FetchError;
pub use error::ParseAnomaly;
pub use error::StateError;
