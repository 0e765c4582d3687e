use crate::error::{ClientError, RequestFailure};
use crate::models::{
    AnalysisResponse, AnalyzeRequest, ChatRequest, ChatResponse, DatasetPreview, ErrorDetail,
    FileInfo, FileListResponse, UploadResponse,
};
use poll_promise::Promise;
use reqwest::Url;
use reqwest::blocking::{Client, Response, multipart};
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// What gets posted to `/upload/`.
#[derive(Debug, Clone)]
pub enum UploadSource {
    Path(PathBuf),
    Bytes { name: String, bytes: Arc<[u8]> },
}

impl UploadSource {
    pub fn file_name(&self) -> String {
        match self {
            UploadSource::Path(path) => path
                .file_name()
                .and_then(|s| s.to_str())
                .unwrap_or("upload")
                .to_string(),
            UploadSource::Bytes { name, .. } => name.clone(),
        }
    }
}

/// Thin wrapper over the backend's REST surface. No retries, no auth, no caching,
/// and no request timeout.
#[derive(Clone)]
pub struct ApiClient {
    base: Url,
    http: Client,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let base = Url::parse(base_url).map_err(|e| ClientError::InvalidUrl(e.to_string()))?;
        let http = Client::builder()
            .timeout(None::<Duration>)
            .build()
            .map_err(|e| ClientError::Network(e.to_string()))?;
        Ok(Self { base, http })
    }

    /// Builds `<base>/<segments...>`; a trailing `""` segment yields a trailing slash.
    /// Segments are percent-encoded, so filenames with spaces are safe.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub fn list_files(&self) -> Result<Vec<FileInfo>, ClientError> {
        let url = self.endpoint(&["files", ""])?;
        debug!(%url, "GET file list");
        let resp = self.http.get(url).send()?;
        let list: FileListResponse = read_json(resp)?;
        Ok(list.files)
    }

    pub fn upload_file(&self, source: &UploadSource) -> Result<UploadResponse, ClientError> {
        let url = self.endpoint(&["upload", ""])?;
        let form = match source {
            UploadSource::Path(path) => multipart::Form::new().file("file", path)?,
            UploadSource::Bytes { name, bytes } => multipart::Form::new().part(
                "file",
                multipart::Part::bytes(bytes.to_vec()).file_name(name.clone()),
            ),
        };
        debug!(%url, file = %source.file_name(), "POST upload");
        let resp = self.http.post(url).multipart(form).send()?;
        let uploaded: UploadResponse = read_json(resp)?;
        info!(file = %source.file_name(), size = ?uploaded.size, "upload finished");
        Ok(uploaded)
    }

    pub fn delete_file(&self, filename: &str) -> Result<(), ClientError> {
        let url = self.endpoint(&["files", filename])?;
        debug!(%url, "DELETE file");
        let resp = self.http.delete(url).send()?;
        let status = resp.status().as_u16();
        let body = resp.text()?;
        check_status(status, &body)?;
        info!(file = filename, "file deleted");
        Ok(())
    }

    pub fn dataset_preview(&self, filename: &str) -> Result<DatasetPreview, ClientError> {
        let url = self.endpoint(&["dataset", filename])?;
        debug!(%url, "GET dataset preview");
        let resp = self.http.get(url).send()?;
        read_json(resp)
    }

    pub fn analyze(&self, request: &AnalyzeRequest) -> Result<AnalysisResponse, ClientError> {
        let url = self.endpoint(&["analyze", ""])?;
        debug!(%url, file = %request.filename, "POST analyze");
        let resp = self.http.post(url).json(request).send()?;
        let raw: AnalysisResponse = read_json(resp)?;
        let normalized = raw.normalize(request)?;
        info!(
            file = %request.filename,
            insights = normalized.results.len(),
            seconds = normalized.processing_time,
            "analysis completed"
        );
        Ok(normalized)
    }

    /// `success: false` is returned as-is; the chat view decides how to show it.
    pub fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ClientError> {
        let url = self.endpoint(&["chat", ""])?;
        debug!(%url, file = %request.filename, "POST chat");
        let resp = self.http.post(url).json(request).send()?;
        read_json(resp)
    }
}

fn read_json<T: DeserializeOwned>(resp: Response) -> Result<T, ClientError> {
    let status = resp.status().as_u16();
    let body = resp.text()?;
    decode_body(status, &body)
}

pub fn check_status(status: u16, body: &str) -> Result<(), ClientError> {
    if (200..300).contains(&status) {
        return Ok(());
    }
    let detail = match serde_json::from_str::<ErrorDetail>(body) {
        Ok(parsed) => parsed.message(),
        Err(_) if !body.trim().is_empty() => body.trim().to_string(),
        Err(_) => format!("request failed with status {}", status),
    };
    warn!(status, %detail, "backend returned an error");
    Err(ClientError::Server { status, detail })
}

pub fn decode_body<T: DeserializeOwned>(status: u16, body: &str) -> Result<T, ClientError> {
    check_status(status, body)?;
    Ok(serde_json::from_str(body)?)
}

pub fn list_files_promise(client: ApiClient) -> Promise<Result<Vec<FileInfo>, RequestFailure>> {
    Promise::spawn_thread("list_files_request", move || {
        client.list_files().map_err(RequestFailure::from)
    })
}

pub fn upload_promise(
    client: ApiClient,
    source: UploadSource,
) -> Promise<Result<UploadResponse, RequestFailure>> {
    Promise::spawn_thread("upload_request", move || {
        client.upload_file(&source).map_err(RequestFailure::from)
    })
}

pub fn delete_promise(
    client: ApiClient,
    filename: String,
) -> Promise<Result<String, RequestFailure>> {
    Promise::spawn_thread("delete_request", move || {
        client
            .delete_file(&filename)
            .map(|_| filename)
            .map_err(RequestFailure::from)
    })
}

pub fn preview_promise(
    client: ApiClient,
    filename: String,
) -> Promise<Result<DatasetPreview, RequestFailure>> {
    Promise::spawn_thread("preview_request", move || {
        client.dataset_preview(&filename).map_err(RequestFailure::from)
    })
}

pub fn analyze_promise(
    client: ApiClient,
    request: AnalyzeRequest,
) -> Promise<Result<AnalysisResponse, RequestFailure>> {
    Promise::spawn_thread("analyze_request", move || {
        client.analyze(&request).map_err(RequestFailure::from)
    })
}

pub fn chat_promise(
    client: ApiClient,
    request: ChatRequest,
) -> Promise<Result<ChatResponse, RequestFailure>> {
    Promise::spawn_thread("chat_request", move || {
        client.chat(&request).map_err(RequestFailure::from)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_keep_trailing_slash() {
        let client = ApiClient::new("http://localhost:8000").unwrap();
        assert_eq!(
            client.endpoint(&["files", ""]).unwrap().as_str(),
            "http://localhost:8000/files/"
        );
        assert_eq!(
            client.endpoint(&["analyze", ""]).unwrap().as_str(),
            "http://localhost:8000/analyze/"
        );
    }

    #[test]
    fn filenames_are_percent_encoded() {
        let client = ApiClient::new("http://localhost:8000/api").unwrap();
        assert_eq!(
            client.endpoint(&["files", "q1 sales.csv"]).unwrap().as_str(),
            "http://localhost:8000/api/files/q1%20sales.csv"
        );
    }

    #[test]
    fn server_detail_is_extracted() {
        let err = decode_body::<UploadResponse>(400, r#"{"detail":"File sales.csv already exists"}"#)
            .unwrap_err();
        match err {
            ClientError::Server { status, detail } => {
                assert_eq!(status, 400);
                assert_eq!(detail, "File sales.csv already exists");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn empty_error_body_uses_status() {
        let err = check_status(502, "").unwrap_err();
        assert_eq!(err.user_message(), "request failed with status 502");
    }

    #[test]
    fn bad_json_is_a_decode_error() {
        let err = decode_body::<FileListResponse>(200, "<html>").unwrap_err();
        assert!(matches!(err, ClientError::Decode(_)));
    }

    #[test]
    fn upload_source_names() {
        let path = UploadSource::Path(PathBuf::from("/tmp/data/sales.csv"));
        assert_eq!(path.file_name(), "sales.csv");
        let bytes = UploadSource::Bytes {
            name: "drop.xlsx".into(),
            bytes: Arc::from(vec![1u8, 2, 3]),
        };
        assert_eq!(bytes.file_name(), "drop.xlsx");
    }
}
