//! Blog posts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use super::product::ImageRef;

pub type BlogPostId = i64;

pub const DEFAULT_SECTION: &str = "news";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlogPost {
    pub id: BlogPostId,
    pub title: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub section: String,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub published: bool,
    #[serde(default)]
    pub cover_image: Option<ImageRef>,
    #[serde(default)]
    pub gallery: Vec<ImageRef>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Editable fields of a post. Unset fields take the defaults the store has always used.
#[derive(Clone, Debug, Default)]
pub struct BlogPostDraft {
    pub title: String,
    pub slug: Option<String>,
    pub section: Option<String>,
    pub tag: Option<String>,
    pub excerpt: Option<String>,
    pub body: Option<String>,
    pub published: Option<bool>,
    pub cover_image: Option<ImageRef>,
    pub gallery: Vec<ImageRef>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BlogPostPayload {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    pub section: String,
    pub tag: String,
    pub excerpt: String,
    pub body: String,
    pub published: bool,
    pub cover_image: Option<ImageRef>,
    pub gallery: Vec<ImageRef>,
}

impl BlogPostDraft {
    pub fn into_payload(self) -> BlogPostPayload {
        let slug = self.slug.filter(|s| !s.is_empty()).or_else(|| (!self.title.is_empty()).then(|| slugify(&self.title)));
        BlogPostPayload {
            slug,
            title: self.title,
            section: self.section.filter(|s| !s.is_empty()).unwrap_or_else(|| DEFAULT_SECTION.to_string()),
            tag: self.tag.unwrap_or_default(),
            excerpt: self.excerpt.unwrap_or_default(),
            body: self.body.unwrap_or_default(),
            published: self.published.unwrap_or(true),
            cover_image: self.cover_image,
            gallery: self.gallery,
        }
    }
}

/// Lowercase, whitespace runs become `-`, anything outside `[a-z0-9-]` is dropped.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut in_space = false;
    for c in title.to_lowercase().chars() {
        if c.is_whitespace() {
            if !in_space { slug.push('-'); }
            in_space = true;
            continue;
        }
        in_space = false;
        if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' { slug.push(c); }
    }
    slug
}
