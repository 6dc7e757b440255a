pub mod gerrit;
pub mod github;

pub use gerrit::GerritSource;
pub use github::GithubSource;

use crate::fetch::{FetchError, TransportError};
use crate::model::{CommitRecord, DateWindow};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// The change listing could not be retrieved. The message is what lands
    /// in the report.
    #[error("Failed to fetch commits")]
    FetchFailed(#[source] FetchError),
    #[error("{url} returned status {status}: {message}")]
    Status {
        url: String,
        status: u16,
        message: String,
    },
    #[error("{0}")]
    Transport(#[from] TransportError),
    #[error("Unexpected response from {url}: {message}")]
    Decode { url: String, message: String },
}

/// A platform that can list its projects and the commits made to each of them.
pub trait CommitSource {
    /// Short platform name used in logs and the JSON report.
    fn platform(&self) -> &'static str;

    fn projects(&self) -> Result<Vec<String>, SourceError>;

    /// Commits made to `project` within `window`. An empty vector means no
    /// activity; an error means the project could not be read.
    fn commits(&self, project: &str, window: &DateWindow)
        -> Result<Vec<CommitRecord>, SourceError>;
}
