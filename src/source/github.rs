use super::{CommitSource, SourceError};
use crate::fetch::{HttpClient, HttpResponse};
use crate::model::{CommitRecord, DateWindow, UNKNOWN};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

const PER_PAGE: u32 = 100;
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

#[derive(Debug, Deserialize)]
struct RepoEntry {
    name: String,
}

#[derive(Debug, Deserialize)]
struct CommitEntry {
    sha: String,
    commit: CommitDetail,
    /// The GitHub account matched to the author email; null when none matches.
    author: Option<Account>,
}

#[derive(Debug, Deserialize)]
struct CommitDetail {
    author: Option<Signature>,
    committer: Option<Signature>,
}

#[derive(Debug, Deserialize)]
struct Signature {
    date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct Account {
    login: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    message: String,
}

/// Every repository of one GitHub organization, read through the REST API.
pub struct GithubSource<C> {
    client: C,
    api_base: String,
    org: String,
    token: Option<String>,
}

impl<C: HttpClient> GithubSource<C> {
    pub fn new(client: C, api_base: &str, org: &str, token: Option<String>) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            org: org.to_string(),
            token: token.filter(|t| !t.is_empty()),
        }
    }

    fn request(&self, url: &str) -> Result<HttpResponse, SourceError> {
        debug!(url, "github request");
        let auth = self.token.as_ref().map(|t| format!("Bearer {t}"));
        let mut headers = vec![
            ("Accept", "application/vnd.github+json"),
            ("X-GitHub-Api-Version", "2022-11-28"),
            ("User-Agent", "commitpulse"),
        ];
        if let Some(auth) = auth.as_deref() {
            headers.push(("Authorization", auth));
        }
        Ok(self.client.get(url, &headers)?)
    }

    /// Walk `Link: rel="next"` pages starting at `url`. `on_status` may turn a
    /// non-success status into an early empty result.
    fn collect_pages<T: DeserializeOwned>(
        &self,
        url: String,
        on_status: impl Fn(u16) -> bool,
    ) -> Result<Vec<T>, SourceError> {
        let mut items = Vec::new();
        let mut next = Some(url);

        while let Some(url) = next.take() {
            let response = self.request(&url)?;
            if !response.is_success() {
                if on_status(response.status) {
                    return Ok(items);
                }
                let message = serde_json::from_str::<ApiMessage>(&response.body)
                    .map(|m| m.message)
                    .unwrap_or_else(|_| response.body.trim().to_string());
                return Err(SourceError::Status {
                    url,
                    status: response.status,
                    message,
                });
            }

            let page: Vec<T> =
                serde_json::from_str(&response.body).map_err(|e| SourceError::Decode {
                    url: url.clone(),
                    message: e.to_string(),
                })?;
            items.extend(page);
            next = response.link.as_deref().and_then(next_link);
        }

        Ok(items)
    }
}

impl<C: HttpClient> CommitSource for GithubSource<C> {
    fn platform(&self) -> &'static str {
        "github"
    }

    fn projects(&self) -> Result<Vec<String>, SourceError> {
        let url = format!(
            "{}/orgs/{}/repos?per_page={PER_PAGE}",
            self.api_base, self.org
        );
        let repos: Vec<RepoEntry> = self.collect_pages(url, |_| false)?;
        Ok(repos.into_iter().map(|r| r.name).collect())
    }

    fn commits(
        &self,
        project: &str,
        window: &DateWindow,
    ) -> Result<Vec<CommitRecord>, SourceError> {
        let url = format!(
            "{}/repos/{}/{}/commits?since={}&until={}&per_page={PER_PAGE}",
            self.api_base,
            self.org,
            project,
            window.start_datetime().format(TIMESTAMP_FORMAT),
            window.end_datetime().format(TIMESTAMP_FORMAT),
        );
        // 409 is how GitHub answers for a repository with no commits at all
        let entries: Vec<CommitEntry> = self.collect_pages(url, |status| status == 409)?;

        let records = entries
            .into_iter()
            .filter_map(|entry| {
                let timestamp = entry
                    .commit
                    .author
                    .as_ref()
                    .and_then(|s| s.date)
                    .or_else(|| entry.commit.committer.as_ref().and_then(|s| s.date))
                    .unwrap_or_else(|| window.start_datetime());
                if !window.contains(&timestamp) {
                    return None;
                }
                let author = entry
                    .author
                    .and_then(|a| a.login)
                    .unwrap_or_else(|| UNKNOWN.to_string());
                Some(CommitRecord::new(entry.sha, author, timestamp))
            })
            .collect();

        Ok(records)
    }
}

/// Extract the `rel="next"` target from an RFC 8288 `Link` header.
pub fn next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|part| {
        let mut pieces = part.split(';');
        let target = pieces.next()?.trim();
        let is_next = pieces.any(|p| {
            let p = p.trim();
            p == "rel=\"next\"" || p == "rel=next"
        });
        if is_next {
            target
                .strip_prefix('<')
                .and_then(|t| t.strip_suffix('>'))
                .map(str::to_string)
        } else {
            None
        }
    })
}
