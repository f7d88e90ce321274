use std::{error::Error as StdError, path::PathBuf};

use skillport_common::FromMessage;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The identifier resolved to no watchable path. A normal negative result.
    #[error("resource not found: {uri}")]
    ResourceNotFound { uri: String },
    /// Release of a path whose reference count is already zero.
    #[error("path is not watched: {}", .path.display())]
    NotWatched { path: PathBuf },
    #[error("failed to watch {}: {source}", .path.display())]
    Watch {
        path: PathBuf,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
    #[error("subscription engine has shut down")]
    EngineClosed,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn not_found(uri: impl Into<String>) -> Self {
        Self::ResourceNotFound { uri: uri.into() }
    }

    #[must_use]
    pub fn watch<E>(path: impl Into<PathBuf>, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Watch {
            path: path.into(),
            source: Box::new(source),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ResourceNotFound { .. })
    }
}

impl FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message { message }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

skillport_common::impl_context!();
