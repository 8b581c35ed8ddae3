//! Blog post list data.
//!
//! Posts are supplied externally (a JSON array on disk) and seeded into the
//! document at `sections.blog.posts` before the first read.  Dates are ISO
//! `YYYY-MM-DD` strings, so ordering them as strings orders them in time.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Document path that receives the post list.
pub const POSTS_SEED_PATH: &str = "sections.blog.posts";

/// Default number of posts returned by [`PostCollection::top`] and
/// [`PostCollection::related`].
pub const DEFAULT_POST_COUNT: usize = 3;

/// One blog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub slug: String,
    pub title: String,
    pub date: String,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub content: String,
    /// Always `/blog/<slug>`; any value in the source data is overwritten.
    #[serde(default)]
    pub href: String,
}

impl Post {
    pub fn href_for(slug: &str) -> String {
        format!("/blog/{slug}")
    }

    fn shares_tag_with(&self, other: &Post) -> bool {
        self.tags.iter().any(|tag| other.tags.contains(tag))
    }
}

/// Posts ordered newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostCollection {
    posts: Vec<Post>,
}

impl PostCollection {
    /// Normalizes `href`s and sorts by date, newest first.
    pub fn new(mut posts: Vec<Post>) -> Self {
        for post in &mut posts {
            post.href = Post::href_for(&post.slug);
        }
        posts.sort_by(|a, b| b.date.cmp(&a.date));
        Self { posts }
    }

    /// Parses a JSON array of posts.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error when the text is not an array of posts.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        let posts: Vec<Post> = serde_json::from_str(text)?;
        Ok(Self::new(posts))
    }

    pub fn all(&self) -> &[Post] {
        &self.posts
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    pub fn by_slug(&self, slug: &str) -> Option<&Post> {
        self.posts.iter().find(|p| p.slug == slug)
    }

    pub fn by_category(&self, category: &str) -> Vec<&Post> {
        self.posts.iter().filter(|p| p.category == category).collect()
    }

    pub fn by_tag(&self, tag: &str) -> Vec<&Post> {
        self.posts
            .iter()
            .filter(|p| p.tags.iter().any(|t| t == tag))
            .collect()
    }

    pub fn by_author(&self, author: &str) -> Vec<&Post> {
        self.posts.iter().filter(|p| p.author == author).collect()
    }

    /// Posts dated within `[start, end]`, inclusive.
    pub fn in_date_range(&self, start: &str, end: &str) -> Vec<&Post> {
        self.posts
            .iter()
            .filter(|p| p.date.as_str() >= start && p.date.as_str() <= end)
            .collect()
    }

    /// Distinct categories in first-seen order.
    pub fn categories(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for post in &self.posts {
            if !seen.contains(&post.category.as_str()) {
                seen.push(&post.category);
            }
        }
        seen
    }

    /// The `count` newest posts.
    pub fn top(&self, count: usize) -> &[Post] {
        &self.posts[..count.min(self.posts.len())]
    }

    /// Up to `count` other posts that share the category or at least one tag.
    pub fn related(&self, post: &Post, count: usize) -> Vec<&Post> {
        self.posts
            .iter()
            .filter(|p| p.slug != post.slug)
            .filter(|p| p.category == post.category || p.shares_tag_with(post))
            .take(count)
            .collect()
    }

    /// The list as a JSON array, ready for seeding.
    pub fn to_value(&self) -> Value {
        Value::Array(
            self.posts
                .iter()
                .filter_map(|p| serde_json::to_value(p).ok())
                .collect(),
        )
    }
}
