//! ============================================================================
//! Blog Client - Community posts in the hosted datastore
//! ============================================================================
//! Talks PostgREST to the `blog_posts` table:
//! - List approved posts (newest first, at most 100)
//! - Submit a post; it stays hidden until a reviewer approves it
//! ============================================================================

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::backend::BackendError;
use crate::retry::{retry_read, RetryConfig};
use crate::types::{BlogPost, NewBlogPost};

const BLOG_TABLE: &str = "rest/v1/blog_posts";
const LISTING_LIMIT: &str = "100";

#[derive(Debug, thiserror::Error)]
pub enum BlogError {
    #[error("Blog datastore is not configured")]
    NotConfigured,

    #[error("Invalid post: {0}")]
    Invalid(String),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

#[derive(Debug, Serialize)]
struct BlogInsert<'a> {
    title: &'a str,
    content: &'a str,
    author_name: &'a str,
    created_at: String,
}

impl NewBlogPost {
    /// Title, content and author are all required
    pub fn validate(&self) -> Result<(), BlogError> {
        for (field, value) in [
            ("title", &self.title),
            ("content", &self.content),
            ("author_name", &self.author_name),
        ] {
            if value.trim().is_empty() {
                return Err(BlogError::Invalid(format!("{} must not be empty", field)));
            }
        }
        Ok(())
    }
}

pub struct BlogClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Arc<str>,
    retry: RetryConfig,
}

impl BlogClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("peertask/0.1")
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: Arc::from(api_key.into()),
            retry: RetryConfig::default(),
        }
    }

    /// Build from optional settings; both the URL and the key are required
    pub fn from_settings(url: Option<&str>, key: Option<&str>) -> Result<Self, BlogError> {
        match (url, key) {
            (Some(url), Some(key)) if !url.trim().is_empty() && !key.trim().is_empty() => {
                Ok(Self::new(url.trim(), key.trim()))
            }
            _ => Err(BlogError::NotConfigured),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn table_url(&self) -> String {
        format!("{}/{}", self.base_url, BLOG_TABLE)
    }

    fn listing_query() -> [(&'static str, &'static str); 4] {
        [
            ("select", "id,title,content,author_name,created_at"),
            ("approved", "eq.true"),
            ("order", "created_at.desc"),
            ("limit", LISTING_LIMIT),
        ]
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("apikey", &*self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
    }

    /// Posts a reviewer has approved
    pub async fn approved_posts(&self) -> Result<Vec<BlogPost>, BlogError> {
        let posts = retry_read("blog_posts", &self.retry, || async {
            let response = self
                .authorized(self.client.get(self.table_url()))
                .query(&Self::listing_query())
                .send()
                .await?;

            if !response.status().is_success() {
                let status = response.status().as_u16();
                let body = response.text().await.unwrap_or_default();
                return Err(BackendError::Status { status, body });
            }

            response
                .json::<Vec<BlogPost>>()
                .await
                .map_err(|e| BackendError::Decode(e.to_string()))
        })
        .await?;

        debug!("Fetched {} approved blog posts", posts.len());
        Ok(posts)
    }

    /// Submit a post for review
    pub async fn submit(&self, post: &NewBlogPost) -> Result<(), BlogError> {
        post.validate()?;

        let insert = BlogInsert {
            title: post.title.trim(),
            content: post.content.trim(),
            author_name: post.author_name.trim(),
            created_at: Utc::now().to_rfc3339(),
        };

        let response = self
            .authorized(self.client.post(self.table_url()))
            .header("Prefer", "return=minimal")
            .json(&[insert])
            .send()
            .await
            .map_err(BackendError::from)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status { status, body }.into());
        }

        info!("Submitted blog post '{}' for review", post.title.trim());
        Ok(())
    }
}
