use thiserror::Error;

/// Client-side checks that stop a request before it is sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("file type .{0} is not supported (allowed: .csv, .xlsx, .xls)")]
    UnsupportedExtension(String),
    #[error("file has no extension (allowed: .csv, .xlsx, .xls)")]
    MissingExtension,
    #[error("file is larger than {max_mb} MB")]
    TooLarge { size: u64, max_mb: u64 },
    #[error("only one file can be uploaded at a time")]
    MultipleFiles,
    #[error("no file selected")]
    NoFileSelected,
    #[error("question is empty")]
    EmptyQuestion,
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("network error: {0}")]
    Network(String),
    #[error("server returned {status}: {detail}")]
    Server { status: u16, detail: String },
    /// The request succeeded at the HTTP level but the payload says it failed.
    #[error("{0}")]
    Rejected(String),
    #[error("could not decode response: {0}")]
    Decode(String),
    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

impl ClientError {
    /// Text suitable for an inline message. Server details are shown as-is.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Server { detail, .. } => detail.clone(),
            ClientError::Rejected(msg) => msg.clone(),
            ClientError::Network(_) => {
                "Network error. Please check that the backend is running.".to_string()
            }
            other => other.to_string(),
        }
    }
}

/// What a finished background request hands back to the UI thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestFailure {
    /// The backend could not be reached at all.
    Network(String),
    /// The backend answered, but with an error.
    Server(String),
}

impl RequestFailure {
    pub fn message(&self) -> &str {
        match self {
            RequestFailure::Network(msg) | RequestFailure::Server(msg) => msg,
        }
    }

    pub fn is_network(&self) -> bool {
        matches!(self, RequestFailure::Network(_))
    }
}

impl std::fmt::Display for RequestFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

impl From<ClientError> for RequestFailure {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Network(_) => RequestFailure::Network(err.user_message()),
            other => RequestFailure::Server(other.user_message()),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::Decode(err.to_string())
        } else {
            ClientError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Decode(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown layout '{0}' (expected tabbed, modal or form)")]
    UnknownLayout(String),
    #[error("invalid backend url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("dataframe error: {0}")]
    DataFrame(#[from] polars::error::PolarsError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_detail_is_shown_verbatim() {
        let err = ClientError::Server {
            status: 400,
            detail: "Only CSV and Excel files are allowed".into(),
        };
        assert_eq!(err.user_message(), "Only CSV and Excel files are allowed");
    }

    #[test]
    fn network_errors_get_a_generic_message() {
        let err = ClientError::Network("connection refused".into());
        assert!(err.user_message().starts_with("Network error"));
    }

    #[test]
    fn failures_keep_network_and_server_apart() {
        let net: RequestFailure = ClientError::Network("refused".into()).into();
        assert!(net.is_network());
        let srv: RequestFailure = ClientError::Server {
            status: 404,
            detail: "File not found".into(),
        }
        .into();
        assert!(!srv.is_network());
        assert_eq!(srv.to_string(), "File not found");
    }

    #[test]
    fn validation_converts_into_client_error() {
        let err: ClientError = ValidationError::EmptyQuestion.into();
        assert_eq!(err.to_string(), "invalid request: question is empty");
    }
}
