//! GitHub REST v3 connector, scoped to one organization.

use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, ACCEPT, LINK, USER_AGENT};
use reqwest::{Client, RequestBuilder, Url};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::http::{endpoint, HttpFetcher, RetryPolicy};
use super::{FetchError, SourceControl};

const API_VERSION: &str = "2022-11-28";
const CLIENT_USER_AGENT: &str = concat!("hub-api/", env!("CARGO_PKG_VERSION"));
/// GitHub caps `per_page` at 100; the repository listing uses a single full page.
const PAGE_SIZE: usize = 100;
const SHORT_SHA_LEN: usize = 7;
const MANIFEST_PATH: &str = "package.json";

#[derive(Debug, Clone)]
pub struct GitHubConfig {
    pub api_url: String,
    pub org: String,
    /// Without a token requests go out unauthenticated at a lower rate limit.
    pub token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRepository {
    pub name: String,
    pub full_name: String,
    pub description: Option<String>,
    pub html_url: String,
    pub default_branch: String,
    pub pushed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub open_issues_count: u32,
    pub language: Option<String>,
    #[serde(default)]
    pub private: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Commit {
    /// Abbreviated hash.
    pub sha: String,
    /// First line of the commit message.
    pub message: String,
    pub author_name: String,
    pub author_email: Option<String>,
    pub author_avatar: Option<String>,
    pub date: DateTime<Utc>,
    pub url: String,
    pub branch: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub name: String,
    #[serde(default)]
    pub protected: bool,
}

#[derive(Debug, Deserialize)]
struct CommitResponse {
    sha: String,
    html_url: String,
    commit: CommitDetail,
    author: Option<AccountRef>,
}

#[derive(Debug, Deserialize)]
struct CommitDetail {
    message: String,
    author: CommitSignature,
}

#[derive(Debug, Deserialize)]
struct CommitSignature {
    name: String,
    email: Option<String>,
    date: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct AccountRef {
    avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentResponse {
    content: String,
    #[serde(default)]
    encoding: String,
}

/// Opaque list element; only the count matters for pull requests.
#[derive(Debug, Deserialize)]
struct Ignored {}

impl CommitResponse {
    fn into_commit(self, branch: Option<&str>) -> Commit {
        Commit {
            sha: self.sha.chars().take(SHORT_SHA_LEN).collect(),
            message: first_line(&self.commit.message).to_string(),
            author_name: self.commit.author.name,
            author_email: self.commit.author.email,
            author_avatar: self.author.and_then(|a| a.avatar_url),
            date: self.commit.author.date,
            url: self.html_url,
            branch: branch.map(str::to_string),
        }
    }
}

fn first_line(message: &str) -> &str {
    message.lines().next().unwrap_or("").trim_end()
}

/// Decodes a contents-API payload. GitHub wraps base64 at 60 columns, so
/// whitespace is stripped before decoding.
fn decode_content(content: &ContentResponse) -> Result<String, FetchError> {
    if !content.encoding.is_empty() && content.encoding != "base64" {
        return Err(FetchError::Decode(format!(
            "unsupported encoding '{}'",
            content.encoding
        )));
    }
    let compact: String = content
        .content
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| FetchError::Decode(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| FetchError::Decode(e.to_string()))
}

/// Page number of the `rel="last"` entry in a `Link` header. With
/// `per_page=1` that is the total item count.
fn last_page(headers: &HeaderMap) -> Option<u32> {
    let link = headers.get(LINK)?.to_str().ok()?;
    link.split(',').find_map(|entry| {
        let (target, params) = entry.split_once(';')?;
        if !params.split(';').any(|p| p.trim() == r#"rel="last""#) {
            return None;
        }
        let target = target.trim().trim_start_matches('<').trim_end_matches('>');
        let url = Url::parse(target).ok()?;
        let page = url.query_pairs().find(|(key, _)| key == "page")?.1;
        page.parse().ok()
    })
}

pub struct GitHubClient {
    config: GitHubConfig,
    http: HttpFetcher,
}

impl GitHubClient {
    pub fn new(config: GitHubConfig, policy: RetryPolicy) -> Self {
        Self {
            config,
            http: HttpFetcher::new("GitHub", policy),
        }
    }

    fn request(&self, client: &Client, url: &Url) -> RequestBuilder {
        let request = client
            .get(url.clone())
            .header(ACCEPT, "application/vnd.github+json")
            .header(USER_AGENT, CLIENT_USER_AGENT)
            .header("X-GitHub-Api-Version", API_VERSION);
        match &self.config.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn repo_url(&self, repo: &str, tail: &[&str]) -> Result<Url, FetchError> {
        let mut segments = vec!["repos", self.config.org.as_str(), repo];
        segments.extend_from_slice(tail);
        endpoint(&self.config.api_url, &segments)
    }
}

#[async_trait]
impl SourceControl for GitHubClient {
    async fn try_commits(
        &self,
        repo: &str,
        limit: usize,
        branch: Option<&str>,
    ) -> Result<Vec<Commit>, FetchError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let url = self.repo_url(repo, &["commits"])?;
        let mut query = vec![("per_page", limit.min(PAGE_SIZE).to_string())];
        if let Some(branch) = branch {
            query.push(("sha", branch.to_string()));
        }

        let raw: Vec<CommitResponse> = self
            .http
            .get_json(|c| self.request(c, &url).query(&query))
            .await?;

        debug!("Fetched {} commits for {repo}", raw.len());
        Ok(raw
            .into_iter()
            .take(limit)
            .map(|c| c.into_commit(branch))
            .collect())
    }

    async fn try_branches(&self, repo: &str) -> Result<Vec<Branch>, FetchError> {
        let url = self.repo_url(repo, &["branches"])?;
        self.http
            .get_json(|c| {
                self.request(c, &url)
                    .query(&[("per_page", PAGE_SIZE.to_string())])
            })
            .await
    }

    async fn try_repository(&self, repo: &str) -> Result<Option<RemoteRepository>, FetchError> {
        let url = self.repo_url(repo, &[])?;
        match self.http.get_json(|c| self.request(c, &url)).await {
            Ok(repository) => Ok(Some(repository)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn try_manifest(&self, repo: &str, branch: Option<&str>) -> Result<String, FetchError> {
        let url = self.repo_url(repo, &["contents", MANIFEST_PATH])?;
        let content: ContentResponse = self
            .http
            .get_json(|c| {
                let request = self.request(c, &url);
                match branch {
                    Some(branch) => request.query(&[("ref", branch)]),
                    None => request,
                }
            })
            .await?;
        decode_content(&content)
    }

    async fn try_open_pull_request_count(&self, repo: &str) -> Result<u32, FetchError> {
        let url = self.repo_url(repo, &["pulls"])?;
        let (pulls, headers): (Vec<Ignored>, _) = self
            .http
            .get_json_with_headers(|c| {
                self.request(c, &url)
                    .query(&[("state", "open"), ("per_page", "1")])
            })
            .await?;
        // No Link header means everything fit on the one page.
        Ok(last_page(&headers).unwrap_or(pulls.len() as u32))
    }

    async fn try_organization_repositories(&self) -> Result<Vec<RemoteRepository>, FetchError> {
        let url = endpoint(&self.config.api_url, &["orgs", self.config.org.as_str(), "repos"])?;
        let mut repos: Vec<RemoteRepository> = self
            .http
            .get_json(|c| {
                self.request(c, &url).query(&[
                    ("sort", "pushed"),
                    ("direction", "desc"),
                    ("per_page", "100"),
                ])
            })
            .await?;
        // Never-pushed repositories (pushed_at = None) sort last.
        repos.sort_by(|a, b| b.pushed_at.cmp(&a.pushed_at));
        repos.truncate(PAGE_SIZE);
        debug!("Fetched {} repositories for {}", repos.len(), self.config.org);
        Ok(repos)
    }
}
