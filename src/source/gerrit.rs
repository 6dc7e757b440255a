use super::{CommitSource, SourceError};
use crate::fetch::{Fetcher, HttpClient, Sleeper};
use crate::model::{CommitRecord, DateWindow};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info, warn};

#[derive(Debug, Deserialize)]
struct ChangeInfo {
    id: Option<String>,
    change_id: Option<String>,
    created: Option<String>,
    owner: Option<Owner>,
    #[serde(default, rename = "_more_changes")]
    more_changes: bool,
}

impl ChangeInfo {
    fn label(&self) -> &str {
        self.id
            .as_deref()
            .or(self.change_id.as_deref())
            .unwrap_or("unknown")
    }
}

#[derive(Debug, Deserialize)]
struct Owner {
    #[serde(rename = "_account_id")]
    account_id: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct AccountInfo {
    username: Option<String>,
}

/// A fixed list of projects on one Gerrit server, read anonymously.
///
/// Each change is attributed to its owner's username, which costs one account
/// lookup per change. Changes whose owner cannot be resolved are skipped.
pub struct GerritSource<C, S> {
    fetcher: Fetcher<C, S>,
    base_url: String,
    projects: Vec<String>,
}

impl<C: HttpClient, S: Sleeper> GerritSource<C, S> {
    pub fn new(fetcher: Fetcher<C, S>, base_url: &str, projects: Vec<String>) -> Self {
        Self {
            fetcher,
            base_url: base_url.trim_end_matches('/').to_string(),
            projects,
        }
    }

    pub fn changes_url(&self, project: &str, window: &DateWindow, offset: usize) -> String {
        let mut url = format!(
            "{}/changes/?q=project:{}+after:{}+before:{}&o=ALL_REVISIONS",
            self.base_url,
            project,
            window.start().format("%Y-%m-%d"),
            window.end().format("%Y-%m-%d"),
        );
        if offset > 0 {
            url.push_str(&format!("&S={offset}"));
        }
        url
    }

    fn fetch_changes(
        &self,
        project: &str,
        window: &DateWindow,
    ) -> Result<Vec<ChangeInfo>, SourceError> {
        let mut changes: Vec<ChangeInfo> = Vec::new();
        loop {
            let url = self.changes_url(project, window, changes.len());
            debug!(url = %url, "fetching changes");
            let value = self
                .fetcher
                .fetch_json(&url)
                .map_err(SourceError::FetchFailed)?;
            let page: Vec<ChangeInfo> =
                serde_json::from_value(value).map_err(|e| SourceError::Decode {
                    url: url.clone(),
                    message: e.to_string(),
                })?;
            let more = page.last().is_some_and(|c| c.more_changes);
            let fetched = page.len();
            changes.extend(page);
            if !more || fetched == 0 {
                return Ok(changes);
            }
        }
    }

    /// Resolve a Gerrit account id to its username.
    pub fn fetch_user_details(&self, account_id: u64) -> Option<String> {
        let url = format!("{}/accounts/{account_id}", self.base_url);
        debug!(url = %url, "fetching user details");
        let value = self.fetcher.fetch_json(&url).ok()?;
        serde_json::from_value::<AccountInfo>(value).ok()?.username
    }

    fn attribute(&self, change: &ChangeInfo) -> Option<String> {
        let Some(account_id) = change.owner.as_ref().and_then(|o| o.account_id) else {
            warn!(change = change.label(), "change has no owner account id, skipping");
            return None;
        };
        let Some(username) = self.fetch_user_details(account_id) else {
            warn!(account_id, "failed to fetch user details or no username, skipping");
            return None;
        };
        Some(username)
    }
}

impl<C: HttpClient, S: Sleeper> CommitSource for GerritSource<C, S> {
    fn platform(&self) -> &'static str {
        "gerrit"
    }

    fn projects(&self) -> Result<Vec<String>, SourceError> {
        Ok(self.projects.clone())
    }

    fn commits(
        &self,
        project: &str,
        window: &DateWindow,
    ) -> Result<Vec<CommitRecord>, SourceError> {
        let changes = self.fetch_changes(project, window)?;
        info!(project, changes = changes.len(), "fetched changes");

        let mut records = Vec::with_capacity(changes.len());
        for change in &changes {
            debug!(change = change.label(), "processing change");
            if let Some(author) = self.attribute(change) {
                let timestamp = change
                    .created
                    .as_deref()
                    .and_then(parse_gerrit_timestamp)
                    .unwrap_or_default();
                records.push(CommitRecord::new(change.label(), author, timestamp));
            }
        }
        Ok(records)
    }
}

/// Gerrit timestamps look like `2024-01-15 09:30:00.000000000` and are UTC.
pub fn parse_gerrit_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|dt| dt.and_utc())
}
