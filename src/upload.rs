use crate::client::{self, ApiClient, UploadSource};
use crate::error::{RequestFailure, ValidationError};
use crate::format::{extension, format_file_size};
use crate::models::UploadResponse;
use eframe::egui;
use eframe::egui::{Color32, Ui};
use poll_promise::Promise;
use rfd::FileDialog;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub const ALLOWED_EXTENSIONS: [&str; 3] = ["csv", "xlsx", "xls"];

const PROGRESS_STEP: u8 = 10;
const PROGRESS_CAP: u8 = 90;
const PROGRESS_INTERVAL: Duration = Duration::from_millis(200);
const SUCCESS_CLEAR_AFTER: Duration = Duration::from_secs(3);
const ERROR_CLEAR_AFTER: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStatus {
    Idle,
    Uploading,
    Success,
    Error,
}

#[derive(Debug, Clone)]
pub enum UploadEvent {
    Uploaded(UploadResponse),
}

/// A file offered to the widget, by picker or by drop.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub source: UploadSource,
    pub size: u64,
}

pub fn validate_upload(name: &str, size: u64, max_bytes: u64) -> Result<(), ValidationError> {
    let ext = extension(name).ok_or(ValidationError::MissingExtension)?;
    if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(ValidationError::UnsupportedExtension(ext));
    }
    if size > max_bytes {
        return Err(ValidationError::TooLarge {
            size,
            max_mb: max_bytes / (1024 * 1024),
        });
    }
    Ok(())
}

pub struct UploadWidget {
    pub status: UploadStatus,
    pub progress: u8,
    pub message: String,
    file_name: String,
    next_tick: Option<Instant>,
    clear_at: Option<Instant>,
    promise: Option<Promise<Result<UploadResponse, RequestFailure>>>,
}

impl Default for UploadWidget {
    fn default() -> Self {
        Self {
            status: UploadStatus::Idle,
            progress: 0,
            message: String::new(),
            file_name: String::new(),
            next_tick: None,
            clear_at: None,
            promise: None,
        }
    }
}

impl UploadWidget {
    pub fn is_busy(&self) -> bool {
        self.status == UploadStatus::Uploading
    }

    pub fn has_request_in_flight(&self) -> bool {
        self.promise.is_some()
    }

    /// Validates and, if accepted, posts the file on a worker thread.
    /// Returns `false` when nothing was sent.
    pub fn start(
        &mut self,
        client: &ApiClient,
        mut candidates: Vec<Candidate>,
        max_bytes: u64,
        now: Instant,
    ) -> bool {
        if self.is_busy() {
            return false;
        }
        if candidates.len() > 1 {
            self.reject(ValidationError::MultipleFiles, now);
            return false;
        }
        let Some(candidate) = candidates.pop() else {
            return false;
        };
        let name = candidate.source.file_name();
        if let Err(err) = validate_upload(&name, candidate.size, max_bytes) {
            self.reject(err, now);
            return false;
        }
        let promise = client::upload_promise(client.clone(), candidate.source);
        self.track(&name, promise, now);
        true
    }

    /// Follows an upload already posted on a worker thread.
    pub fn track(
        &mut self,
        file_name: &str,
        promise: Promise<Result<UploadResponse, RequestFailure>>,
        now: Instant,
    ) {
        self.begin(file_name, now);
        self.promise = Some(promise);
    }

    pub fn reject(&mut self, err: ValidationError, now: Instant) {
        warn!(%err, "file rejected before upload");
        self.status = UploadStatus::Error;
        self.progress = 0;
        self.message = format!("File rejected: {}", err);
        self.next_tick = None;
        self.clear_at = Some(now + ERROR_CLEAR_AFTER);
    }

    pub fn begin(&mut self, file_name: &str, now: Instant) {
        debug!(file = file_name, "upload started");
        self.status = UploadStatus::Uploading;
        self.progress = 0;
        self.message = "Preparing upload...".to_string();
        self.file_name = file_name.to_string();
        self.next_tick = Some(now + PROGRESS_INTERVAL);
        self.clear_at = None;
    }

    /// Advances the simulated progress and expires finished statuses.
    pub fn tick(&mut self, now: Instant) {
        match self.status {
            UploadStatus::Uploading => {
                while let Some(due) = self.next_tick {
                    if due > now {
                        break;
                    }
                    self.progress = (self.progress + PROGRESS_STEP).min(PROGRESS_CAP);
                    self.message = format!("Uploading {}...", self.file_name);
                    self.next_tick = Some(due + PROGRESS_INTERVAL);
                }
            }
            UploadStatus::Success | UploadStatus::Error => {
                if self.clear_at.is_some_and(|at| at <= now) {
                    self.reset();
                }
            }
            UploadStatus::Idle => {}
        }
    }

    pub fn finish(
        &mut self,
        result: Result<UploadResponse, RequestFailure>,
        now: Instant,
    ) -> Option<UploadEvent> {
        self.next_tick = None;
        match result {
            Ok(resp) => {
                let rows = resp
                    .rows
                    .map(|r| r.to_string())
                    .unwrap_or_else(|| "unknown".into());
                let cols = resp
                    .columns
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "unknown".into());
                self.status = UploadStatus::Success;
                self.progress = 100;
                self.message = format!(
                    "Successfully uploaded {}. File contains {} rows and {} columns.",
                    self.file_name, rows, cols
                );
                self.clear_at = Some(now + SUCCESS_CLEAR_AFTER);
                Some(UploadEvent::Uploaded(resp))
            }
            Err(err) => {
                self.status = UploadStatus::Error;
                self.progress = 0;
                self.message = format!("Upload failed: {}", err);
                self.clear_at = Some(now + ERROR_CLEAR_AFTER);
                None
            }
        }
    }

    /// Picks up a finished upload, at most once per request.
    pub fn poll(&mut self, now: Instant) -> Option<UploadEvent> {
        let ready = self
            .promise
            .as_ref()
            .and_then(|promise| promise.ready().cloned());
        let event = match ready {
            Some(result) => {
                self.promise = None;
                self.finish(result, now)
            }
            None => None,
        };
        self.tick(now);
        event
    }

    pub fn next_wakeup(&self) -> Option<Instant> {
        match self.status {
            UploadStatus::Uploading => self.next_tick,
            UploadStatus::Success | UploadStatus::Error => self.clear_at,
            UploadStatus::Idle => None,
        }
    }

    fn reset(&mut self) {
        self.status = UploadStatus::Idle;
        self.progress = 0;
        self.message.clear();
        self.clear_at = None;
        self.next_tick = None;
    }
}

fn dropped_candidates(ctx: &egui::Context) -> Vec<Candidate> {
    ctx.input(|i| {
        i.raw
            .dropped_files
            .iter()
            .filter_map(|file| {
                if let Some(path) = &file.path {
                    let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
                    Some(Candidate {
                        source: UploadSource::Path(path.clone()),
                        size,
                    })
                } else {
                    file.bytes.as_ref().map(|bytes| Candidate {
                        size: bytes.len() as u64,
                        source: UploadSource::Bytes {
                            name: file.name.clone(),
                            bytes: bytes.clone(),
                        },
                    })
                }
            })
            .collect()
    })
}

fn picked_candidate() -> Option<Candidate> {
    let path = FileDialog::new()
        .add_filter("Data files", &ALLOWED_EXTENSIONS)
        .pick_file()?;
    let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
    Some(Candidate {
        source: UploadSource::Path(path),
        size,
    })
}

/// Drop zone plus picker. Only starts uploads and draws; the owner calls
/// `UploadWidget::poll` every frame, visible or not.
pub fn upload_panel(ui: &mut Ui, widget: &mut UploadWidget, client: &ApiClient, max_bytes: u64) {
    let now = Instant::now();
    let ctx = ui.ctx().clone();

    let dropped = dropped_candidates(&ctx);
    if !dropped.is_empty() {
        widget.start(client, dropped, max_bytes, now);
    }
    let hovering = ctx.input(|i| !i.raw.hovered_files.is_empty());

    egui::Frame::group(ui.style()).show(ui, |ui| {
        ui.set_min_width(ui.available_width());
        ui.vertical_centered(|ui| match widget.status {
            UploadStatus::Uploading => {
                ui.spinner();
                ui.label(&widget.message);
                ui.add(
                    egui::ProgressBar::new(widget.progress as f32 / 100.0).show_percentage(),
                );
            }
            UploadStatus::Success => {
                ui.colored_label(Color32::from_rgb(80, 200, 120), &widget.message);
            }
            UploadStatus::Error => {
                ui.colored_label(Color32::RED, &widget.message);
            }
            UploadStatus::Idle => {
                if hovering {
                    ui.heading("Drop your file here!");
                } else {
                    ui.heading("Drag & drop your data file here");
                    ui.label("or click to browse files");
                }
                if ui.button("Choose File").clicked() {
                    if let Some(candidate) = picked_candidate() {
                        widget.start(client, vec![candidate], max_bytes, Instant::now());
                    }
                }
            }
        });
    });

    if widget.status == UploadStatus::Idle {
        ui.label(format!(
            "Supported formats: CSV (.csv), Excel (.xlsx, .xls). Maximum file size: {}.",
            format_file_size(max_bytes)
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const MAX: u64 = 50 * 1024 * 1024;

    fn client() -> ApiClient {
        ApiClient::new("http://127.0.0.1:9").unwrap()
    }

    fn candidate(name: &str, size: u64) -> Candidate {
        Candidate {
            source: UploadSource::Path(PathBuf::from(name)),
            size,
        }
    }

    #[test]
    fn allowed_extensions_only() {
        assert!(validate_upload("sales.csv", 10, MAX).is_ok());
        assert!(validate_upload("Book.XLSX", 10, MAX).is_ok());
        assert!(validate_upload("old.xls", 10, MAX).is_ok());
        assert_eq!(
            validate_upload("notes.txt", 10, MAX),
            Err(ValidationError::UnsupportedExtension("txt".into()))
        );
        assert_eq!(
            validate_upload("Makefile", 10, MAX),
            Err(ValidationError::MissingExtension)
        );
        assert!(matches!(
            validate_upload("big.csv", MAX + 1, MAX),
            Err(ValidationError::TooLarge { max_mb: 50, .. })
        ));
    }

    #[test]
    fn rejected_file_never_reaches_the_network() {
        let mut widget = UploadWidget::default();
        let sent = widget.start(&client(), vec![candidate("report.pdf", 10)], MAX, Instant::now());
        assert!(!sent);
        assert!(!widget.has_request_in_flight());
        assert_eq!(widget.status, UploadStatus::Error);
        assert!(widget.message.starts_with("File rejected:"));
    }

    #[test]
    fn several_files_at_once_are_rejected() {
        let mut widget = UploadWidget::default();
        let files = vec![candidate("a.csv", 1), candidate("b.csv", 1)];
        assert!(!widget.start(&client(), files, MAX, Instant::now()));
        assert!(!widget.has_request_in_flight());
        assert!(widget.message.contains("one file"));
    }

    #[test]
    fn progress_is_capped_below_completion() {
        let t0 = Instant::now();
        let mut widget = UploadWidget::default();
        widget.begin("sales.csv", t0);
        assert_eq!(widget.progress, 0);
        assert_eq!(widget.message, "Preparing upload...");

        widget.tick(t0 + Duration::from_millis(200));
        assert_eq!(widget.progress, 10);
        assert_eq!(widget.message, "Uploading sales.csv...");

        widget.tick(t0 + Duration::from_millis(650));
        assert_eq!(widget.progress, 30);

        widget.tick(t0 + Duration::from_secs(10));
        assert_eq!(widget.progress, 90);
    }

    #[test]
    fn success_emits_one_event_and_clears_after_three_seconds() {
        let t0 = Instant::now();
        let mut widget = UploadWidget::default();
        widget.begin("sales.csv", t0);
        let resp = UploadResponse {
            rows: Some(100),
            columns: Some(4),
            ..Default::default()
        };
        let event = widget.finish(Ok(resp), t0 + Duration::from_millis(300));
        assert!(matches!(event, Some(UploadEvent::Uploaded(_))));
        assert_eq!(widget.progress, 100);
        assert_eq!(
            widget.message,
            "Successfully uploaded sales.csv. File contains 100 rows and 4 columns."
        );

        assert!(widget.poll(t0 + Duration::from_secs(1)).is_none());
        widget.tick(t0 + Duration::from_secs(2));
        assert_eq!(widget.status, UploadStatus::Success);
        widget.tick(t0 + Duration::from_millis(3300));
        assert_eq!(widget.status, UploadStatus::Idle);
        assert!(widget.message.is_empty());
    }

    #[test]
    fn tracked_upload_finishes_on_poll() {
        let t0 = Instant::now();
        let mut widget = UploadWidget::default();
        let resp = UploadResponse {
            filename: Some("sales.csv".into()),
            ..Default::default()
        };
        widget.track("sales.csv", Promise::from_ready(Ok(resp)), t0);
        assert!(widget.is_busy());
        assert!(widget.has_request_in_flight());

        assert!(matches!(widget.poll(t0), Some(UploadEvent::Uploaded(_))));
        assert!(!widget.has_request_in_flight());
        assert_eq!(widget.status, UploadStatus::Success);
        assert!(widget.poll(t0).is_none(), "one event per upload");
    }

    #[test]
    fn unknown_counts_are_spelled_out() {
        let t0 = Instant::now();
        let mut widget = UploadWidget::default();
        widget.begin("raw.xlsx", t0);
        widget.finish(Ok(UploadResponse::default()), t0);
        assert!(widget.message.ends_with("unknown rows and unknown columns."));
    }

    #[test]
    fn failure_shows_server_text_and_clears_after_five_seconds() {
        let t0 = Instant::now();
        let mut widget = UploadWidget::default();
        widget.begin("sales.csv", t0);
        let event = widget.finish(
            Err(RequestFailure::Server("File sales.csv already exists".into())),
            t0,
        );
        assert!(event.is_none());
        assert_eq!(widget.status, UploadStatus::Error);
        assert_eq!(widget.progress, 0);
        assert_eq!(widget.message, "Upload failed: File sales.csv already exists");

        widget.tick(t0 + Duration::from_secs(4));
        assert_eq!(widget.status, UploadStatus::Error);
        widget.tick(t0 + Duration::from_secs(5));
        assert_eq!(widget.status, UploadStatus::Idle);
    }
}
