//! Configuration errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Toml(#[from] toml::de::Error),

    #[error("config error, line {line}: {message}")]
    Parse { line: usize, message: String },
}

impl Error {
    /// Locate the parse error in the source file, so the
    /// message points at something a human can find.
    pub fn config(source: &str, err: toml::de::Error) -> Self {
        let line = err
            .span()
            .and_then(|span| source.get(..span.start))
            .map(|before| before.matches('\n').count() + 1);

        match line {
            Some(line) => Self::Parse {
                line,
                message: err.message().to_string(),
            },
            None => Self::Toml(err),
        }
    }
}
