//! Loads the blog post list from disk.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use sitesync_core::PostCollection;

#[derive(Debug, Error)]
pub enum PostsError {
    #[error("I/O error reading posts at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("posts file {path} is not a JSON array of posts: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Reads the posts file.  A missing file yields an empty collection.
///
/// # Errors
///
/// [`PostsError::Io`] for unreadable files, [`PostsError::Parse`] for
/// content that is not an array of posts.
pub fn load_posts(path: &Path) -> Result<PostCollection, PostsError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("no posts file at {}; starting with no posts", path.display());
            return Ok(PostCollection::default());
        }
        Err(source) => {
            return Err(PostsError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let posts = PostCollection::from_json(&text).map_err(|source| PostsError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    info!("loaded {} posts from {}", posts.len(), path.display());
    Ok(posts)
}
