use crate::analysis::{self, AnalysisForm, FormAction, ResultAction, ResultTab};
use crate::chat::{self, ChatSession};
use crate::client::{self, ApiClient};
use crate::config::{Config, Layout};
use crate::error::RequestFailure;
use crate::file_list::{self, FileListAction};
use crate::models::{AnalysisResponse, AnalyzeRequest, DatasetPreview, FileInfo};
use crate::table::{self, TableView};
use crate::upload::{self, UploadEvent, UploadWidget};
use eframe::egui;
use eframe::egui::{Color32, RichText, Ui};
use poll_promise::Promise;
use std::time::{Duration, Instant};
use tracing::{info, warn};

const NOTICE_TTL: Duration = Duration::from_secs(4);
const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    UploadManage,
    Analyze,
    Results,
}

impl Tab {
    pub const ALL: [Tab; 3] = [Tab::UploadManage, Tab::Analyze, Tab::Results];

    pub fn title(self) -> &'static str {
        match self {
            Tab::UploadManage => "Upload & Manage",
            Tab::Analyze => "Analyze Data",
            Tab::Results => "View Results",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
}

#[derive(Debug, Clone)]
pub struct Notice {
    pub kind: NoticeKind,
    pub text: String,
    expires_at: Instant,
}

/// Work for the HTTP layer, queued by state transitions and run once per frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    RefreshFiles,
    LoadPreview(String),
    Delete(String),
    Analyze(AnalyzeRequest),
}

pub struct DashboardState {
    pub layout: Layout,
    pub files: Vec<FileInfo>,
    pub selected: Option<String>,
    pub preview: Option<DatasetPreview>,
    pub preview_error: Option<String>,
    pub analysis: Option<AnalysisResponse>,
    pub analysis_error: Option<String>,
    pub chat: Option<ChatSession>,
    pub table: TableView,
    pub upload: UploadWidget,
    pub form: AnalysisForm,
    pub question: String,
    pub selected_tab: Tab,
    pub result_tab: ResultTab,
    pub show_upload_modal: bool,
    pub show_preview_modal: bool,
    pub pending_delete: Option<String>,
    pub deleting: Option<String>,
    pub notices: Vec<Notice>,
    reveal_interval: Duration,
    commands: Vec<Command>,
    files_promise: Option<Promise<Result<Vec<FileInfo>, RequestFailure>>>,
    preview_promise: Option<Promise<Result<DatasetPreview, RequestFailure>>>,
    delete_promise: Option<Promise<Result<String, RequestFailure>>>,
    analysis_promise: Option<(Instant, Promise<Result<AnalysisResponse, RequestFailure>>)>,
}

impl DashboardState {
    pub fn new(config: &Config) -> Self {
        Self {
            layout: config.layout,
            files: Vec::new(),
            selected: None,
            preview: None,
            preview_error: None,
            analysis: None,
            analysis_error: None,
            chat: None,
            table: TableView::new(config.page_size),
            upload: UploadWidget::default(),
            form: AnalysisForm::default(),
            question: String::new(),
            selected_tab: Tab::UploadManage,
            result_tab: ResultTab::default(),
            show_upload_modal: false,
            show_preview_modal: false,
            pending_delete: None,
            deleting: None,
            notices: Vec::new(),
            reveal_interval: config.reveal_interval,
            commands: vec![Command::RefreshFiles],
            files_promise: None,
            preview_promise: None,
            delete_promise: None,
            analysis_promise: None,
        }
    }

    pub fn take_commands(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }

    pub fn is_refreshing(&self) -> bool {
        self.files_promise.is_some()
    }

    pub fn is_loading_preview(&self) -> bool {
        self.preview_promise.is_some()
    }

    pub fn is_analyzing(&self) -> bool {
        self.analysis_promise.is_some()
            || self.commands.iter().any(|c| matches!(c, Command::Analyze(_)))
    }

    fn has_request_in_flight(&self) -> bool {
        self.files_promise.is_some()
            || self.preview_promise.is_some()
            || self.delete_promise.is_some()
            || self.analysis_promise.is_some()
            || self.upload.has_request_in_flight()
    }

    pub fn notify(&mut self, kind: NoticeKind, text: impl Into<String>, now: Instant) {
        self.notices.push(Notice {
            kind,
            text: text.into(),
            expires_at: now + NOTICE_TTL,
        });
    }

    pub fn expire_notices(&mut self, now: Instant) {
        self.notices.retain(|n| n.expires_at > now);
    }

    pub fn request_refresh(&mut self) {
        if !self.commands.contains(&Command::RefreshFiles) {
            self.commands.push(Command::RefreshFiles);
        }
    }

    /// Every upload success refreshes the list exactly once.
    pub fn handle_upload_event(&mut self, event: UploadEvent, now: Instant) {
        match event {
            UploadEvent::Uploaded(resp) => {
                let name = resp.filename.clone().unwrap_or_default();
                info!(file = %name, "upload finished");
                self.notify(NoticeKind::Success, format!("Uploaded {}", name), now);
                self.show_upload_modal = false;
                self.request_refresh();
            }
        }
    }

    /// Switches the working file. Preview, results and chat belong to the
    /// previous file and are dropped.
    pub fn select_file(&mut self, filename: &str) {
        if self.selected.as_deref() == Some(filename) {
            return;
        }
        self.clear_dependents();
        self.selected = Some(filename.to_string());
        if self.layout == Layout::Modal {
            self.chat = Some(ChatSession::new(filename, self.reveal_interval));
        }
        self.commands.push(Command::LoadPreview(filename.to_string()));
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
        self.clear_dependents();
    }

    /// A pending preview or analysis belongs to the old file, so its promise
    /// is dropped unapplied.
    fn clear_dependents(&mut self) {
        self.preview = None;
        self.preview_error = None;
        self.preview_promise = None;
        self.analysis = None;
        self.analysis_error = None;
        self.analysis_promise = None;
        self.commands
            .retain(|c| !matches!(c, Command::LoadPreview(_) | Command::Analyze(_)));
        self.chat = None;
        self.table.reset();
        self.result_tab = ResultTab::default();
        self.show_preview_modal = false;
    }

    pub fn confirm_delete(&mut self, filename: &str) {
        if self.deleting.is_some() {
            return;
        }
        self.pending_delete = None;
        self.deleting = Some(filename.to_string());
        self.commands.push(Command::Delete(filename.to_string()));
    }

    pub fn submit_analysis(&mut self, request: AnalyzeRequest) {
        if self.is_analyzing() {
            return;
        }
        self.analysis_error = None;
        self.commands.push(Command::Analyze(request));
    }

    pub fn apply_files(&mut self, result: Result<Vec<FileInfo>, RequestFailure>, now: Instant) {
        match result {
            Ok(files) => self.files = files,
            Err(err) => {
                warn!(%err, "file list refresh failed");
                self.notify(
                    NoticeKind::Error,
                    format!("Failed to load files: {}", err.message()),
                    now,
                );
            }
        }
    }

    pub fn apply_preview(&mut self, result: Result<DatasetPreview, RequestFailure>, now: Instant) {
        match result {
            Ok(preview) => {
                self.table.reset();
                self.preview_error = None;
                self.preview = Some(preview);
            }
            Err(err) => {
                warn!(%err, "dataset preview failed");
                self.preview_error = Some(err.message().to_string());
                self.notify(
                    NoticeKind::Error,
                    format!("Failed to load preview: {}", err.message()),
                    now,
                );
            }
        }
    }

    pub fn apply_deleted(&mut self, result: Result<String, RequestFailure>, now: Instant) {
        self.deleting = None;
        match result {
            Ok(filename) => {
                info!(file = %filename, "file deleted");
                if self.selected.as_deref() == Some(filename.as_str()) {
                    self.clear_selection();
                }
                self.notify(NoticeKind::Success, format!("Deleted {}", filename), now);
                self.request_refresh();
            }
            Err(err) => {
                warn!(%err, "delete failed");
                self.notify(
                    NoticeKind::Error,
                    format!("Failed to delete file: {}", err.message()),
                    now,
                );
            }
        }
    }

    pub fn apply_analysis(
        &mut self,
        result: Result<AnalysisResponse, RequestFailure>,
        now: Instant,
    ) {
        match result {
            Ok(response) => {
                self.analysis = Some(response);
                self.analysis_error = None;
                self.result_tab = ResultTab::Overview;
                if self.layout == Layout::Tabbed {
                    self.selected_tab = Tab::Results;
                }
                self.notify(NoticeKind::Success, "Analysis completed", now);
            }
            Err(err) => {
                warn!(%err, "analysis failed");
                self.analysis_error = Some(err.message().to_string());
                self.notify(
                    NoticeKind::Error,
                    format!("Analysis failed: {}", err.message()),
                    now,
                );
            }
        }
    }

    pub fn run_commands(&mut self, client: &ApiClient) {
        for command in self.take_commands() {
            match command {
                Command::RefreshFiles => {
                    self.files_promise = Some(client::list_files_promise(client.clone()));
                }
                Command::LoadPreview(filename) => {
                    self.preview_promise = Some(client::preview_promise(client.clone(), filename));
                }
                Command::Delete(filename) => {
                    self.delete_promise = Some(client::delete_promise(client.clone(), filename));
                }
                Command::Analyze(request) => {
                    if self.analysis_promise.is_none() {
                        let promise = client::analyze_promise(client.clone(), request);
                        self.analysis_promise = Some((Instant::now(), promise));
                    }
                }
            }
        }
    }

    /// Applies every finished request, uploads included, whether or not the
    /// widget that started it is on screen. Each promise is consumed once.
    pub fn poll(&mut self, now: Instant) {
        if let Some(event) = self.upload.poll(now) {
            self.handle_upload_event(event, now);
        }
        if let Some(result) = self.files_promise.as_ref().and_then(|p| p.ready().cloned()) {
            self.files_promise = None;
            self.apply_files(result, now);
        }
        if let Some(result) = self.preview_promise.as_ref().and_then(|p| p.ready().cloned()) {
            self.preview_promise = None;
            self.apply_preview(result, now);
        }
        if let Some(result) = self.delete_promise.as_ref().and_then(|p| p.ready().cloned()) {
            self.delete_promise = None;
            self.apply_deleted(result, now);
        }
        let finished = self
            .analysis_promise
            .as_ref()
            .and_then(|(started, p)| p.ready().cloned().map(|r| (*started, r)));
        if let Some((started, result)) = finished {
            self.analysis_promise = None;
            if result.is_ok() {
                info!(elapsed_ms = started.elapsed().as_millis() as u64, "analysis completed");
            }
            self.apply_analysis(result, now);
        }
        self.expire_notices(now);
    }

    fn handle_file_action(&mut self, action: FileListAction) {
        match action {
            FileListAction::Select(name) => self.select_file(&name),
            FileListAction::Delete(name) => self.pending_delete = Some(name),
            FileListAction::Refresh => self.request_refresh(),
        }
    }

    fn handle_result_action(&mut self, action: ResultAction, now: Instant) {
        match action {
            ResultAction::DownloadReport => {
                let Some(response) = &self.analysis else {
                    return;
                };
                match analysis::save_report(response) {
                    Ok(Some(path)) => self.notify(
                        NoticeKind::Success,
                        format!("Report saved to {}", path.display()),
                        now,
                    ),
                    Ok(None) => {}
                    Err(err) => {
                        warn!(%err, "report export failed");
                        self.notify(
                            NoticeKind::Error,
                            format!("Failed to save report: {}", err),
                            now,
                        );
                    }
                }
            }
        }
    }
}

fn file_library(ui: &mut Ui, state: &mut DashboardState) {
    let action = file_list::file_list(
        ui,
        &state.files,
        state.selected.as_deref(),
        state.deleting.as_deref(),
        state.is_refreshing(),
    );
    if let Some(action) = action {
        state.handle_file_action(action);
    }
}

fn upload_section(ui: &mut Ui, state: &mut DashboardState, client: &ApiClient, config: &Config) {
    upload::upload_panel(ui, &mut state.upload, client, config.max_upload_bytes);
}

fn preview_section(ui: &mut Ui, state: &mut DashboardState) {
    if state.selected.is_none() {
        return;
    }
    if state.is_loading_preview() {
        ui.horizontal(|ui| {
            ui.spinner();
            ui.label("Loading dataset preview...");
        });
        return;
    }
    if let Some(err) = &state.preview_error {
        ui.colored_label(Color32::RED, err);
        return;
    }
    table::data_table(ui, &mut state.table, state.preview.as_ref());
}

fn delete_confirmation(ctx: &egui::Context, state: &mut DashboardState) {
    let Some(filename) = state.pending_delete.clone() else {
        return;
    };
    egui::Window::new("Confirm Deletion")
        .collapsible(false)
        .resizable(false)
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
        .show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                ui.label(format!("Are you sure you want to delete \"{}\"?", filename));
                ui.add_space(8.0);
                ui.horizontal(|ui| {
                    if ui.button("Yes, Delete").clicked() {
                        state.confirm_delete(&filename);
                    }
                    if ui.button("Cancel").clicked() {
                        state.pending_delete = None;
                    }
                });
            });
        });
}

fn notices(ctx: &egui::Context, state: &DashboardState) {
    if state.notices.is_empty() {
        return;
    }
    egui::Window::new("Notices")
        .title_bar(false)
        .resizable(false)
        .anchor(egui::Align2::RIGHT_TOP, [-12.0, 12.0])
        .show(ctx, |ui| {
            for notice in &state.notices {
                let color = match notice.kind {
                    NoticeKind::Success => Color32::from_rgb(80, 200, 120),
                    NoticeKind::Error => Color32::RED,
                };
                ui.colored_label(color, &notice.text);
            }
        });
}

pub fn tab_bar(ui: &mut Ui, state: &mut DashboardState) {
    ui.horizontal(|ui| {
        for tab in Tab::ALL {
            if ui
                .selectable_label(state.selected_tab == tab, tab.title())
                .clicked()
            {
                state.selected_tab = tab;
            }
        }
    });
}

fn tabbed_layout(ctx: &egui::Context, state: &mut DashboardState, client: &ApiClient, config: &Config) {
    egui::CentralPanel::default().show(ctx, |ui| {
        tab_bar(ui, state);
        ui.separator();

        match state.selected_tab {
            Tab::UploadManage => {
                egui::ScrollArea::vertical()
                    .id_salt("upload_manage")
                    .show(ui, |ui| {
                        upload_section(ui, state, client, config);
                        ui.add_space(12.0);
                        file_library(ui, state);
                        ui.add_space(12.0);
                        preview_section(ui, state);
                    });
            }
            Tab::Analyze => {
                let busy = state.is_analyzing();
                let action = analysis::analysis_form(
                    ui,
                    &mut state.form,
                    &state.files,
                    state.selected.as_deref(),
                    busy,
                );
                match action {
                    Some(FormAction::Select(name)) => state.select_file(&name),
                    Some(FormAction::Submit(request)) => state.submit_analysis(request),
                    None => {}
                }
                if let Some(err) = &state.analysis_error {
                    ui.colored_label(Color32::RED, err);
                }
            }
            Tab::Results => {
                let action = match &state.analysis {
                    Some(response) => analysis::result_view(ui, response, &mut state.result_tab),
                    None => {
                        ui.vertical_centered(|ui| {
                            ui.label("No analysis results yet. Run an analysis from the Analyze Data tab.");
                        });
                        None
                    }
                };
                if let Some(action) = action {
                    state.handle_result_action(action, Instant::now());
                }
            }
        }
    });
}

fn modal_layout(ctx: &egui::Context, state: &mut DashboardState, client: &ApiClient, config: &Config) {
    egui::SidePanel::left("library_panel")
        .resizable(true)
        .default_width(320.0)
        .show(ctx, |ui| {
            ui.horizontal(|ui| {
                if ui.button("⬆ Upload").clicked() {
                    state.show_upload_modal = true;
                }
                let can_preview = state.selected.is_some();
                if ui
                    .add_enabled(can_preview, egui::Button::new("👁 Preview"))
                    .clicked()
                {
                    state.show_preview_modal = true;
                }
            });
            ui.separator();
            egui::ScrollArea::vertical()
                .id_salt("library_scroll")
                .show(ui, |ui| file_library(ui, state));
        });

    egui::CentralPanel::default().show(ctx, |ui| match state.chat.as_mut() {
        Some(session) => chat::chat_panel(ui, session, client),
        None => {
            ui.vertical_centered(|ui| {
                ui.add_space(40.0);
                ui.heading("Select a dataset to start chatting");
                ui.label("Upload a CSV or Excel file, then pick it from the library.");
            });
        }
    });

    if state.show_upload_modal {
        let mut open = true;
        egui::Window::new("Upload Data File")
            .open(&mut open)
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| upload_section(ui, state, client, config));
        if !open && !state.upload.is_busy() {
            state.show_upload_modal = false;
        }
    }

    if state.show_preview_modal {
        let mut open = true;
        let title = state.selected.clone().unwrap_or_else(|| "Dataset Preview".into());
        egui::Window::new(title)
            .id(egui::Id::new("preview_modal"))
            .open(&mut open)
            .resizable(true)
            .default_size([900.0, 600.0])
            .show(ctx, |ui| preview_section(ui, state));
        if !open {
            state.show_preview_modal = false;
        }
    }
}

fn form_layout(ctx: &egui::Context, state: &mut DashboardState, client: &ApiClient, config: &Config) {
    egui::SidePanel::left("files_panel")
        .resizable(true)
        .default_width(340.0)
        .show(ctx, |ui| {
            egui::ScrollArea::vertical()
                .id_salt("files_scroll")
                .show(ui, |ui| {
                    upload_section(ui, state, client, config);
                    ui.add_space(12.0);
                    file_library(ui, state);
                });
        });

    egui::CentralPanel::default().show(ctx, |ui| {
        egui::ScrollArea::vertical()
            .id_salt("qa_scroll")
            .show(ui, |ui| {
                let busy = state.is_analyzing();
                let request = analysis::question_panel(
                    ui,
                    &mut state.question,
                    state.selected.as_deref(),
                    busy,
                    state.analysis.as_ref(),
                    state.analysis_error.as_deref(),
                );
                if let Some(request) = request {
                    state.submit_analysis(request);
                }
                ui.add_space(12.0);
                ui.separator();
                preview_section(ui, state);
            });
    });
}

/// One frame of the dashboard: apply finished requests, draw the layout,
/// then start whatever the frame queued.
pub fn show(ctx: &egui::Context, state: &mut DashboardState, client: &ApiClient, config: &Config) {
    let now = Instant::now();
    state.poll(now);

    egui::TopBottomPanel::top("header").show(ctx, |ui| {
        ui.horizontal(|ui| {
            ui.heading("Sheetsight");
            ui.label(RichText::new("AI data analysis").color(Color32::GRAY));
            if let Some(file) = &state.selected {
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.label(format!("Selected: {}", file));
                });
            }
        });
    });

    match state.layout {
        Layout::Tabbed => tabbed_layout(ctx, state, client, config),
        Layout::Modal => modal_layout(ctx, state, client, config),
        Layout::Form => form_layout(ctx, state, client, config),
    }

    delete_confirmation(ctx, state);
    notices(ctx, state);

    state.run_commands(client);

    if state.has_request_in_flight() {
        ctx.request_repaint_after(POLL_INTERVAL);
    }
    if let Some(at) = state.upload.next_wakeup() {
        ctx.request_repaint_after(at.saturating_duration_since(Instant::now()));
    }
    if let Some(at) = state.notices.iter().map(|n| n.expires_at).min() {
        ctx.request_repaint_after(at.saturating_duration_since(Instant::now()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UploadResponse;
    use std::collections::BTreeMap;

    fn state() -> DashboardState {
        state_with(Layout::Tabbed)
    }

    fn state_with(layout: Layout) -> DashboardState {
        let config = Config {
            layout,
            ..Config::default()
        };
        let mut s = DashboardState::new(&config);
        s.take_commands();
        s
    }

    fn report(id: &str) -> AnalysisResponse {
        AnalysisResponse {
            report_id: id.into(),
            ..Default::default()
        }
    }

    fn file(name: &str) -> FileInfo {
        FileInfo {
            filename: name.into(),
            size: 10,
            upload_date: "2024-01-01".into(),
            rows: None,
            columns: None,
        }
    }

    fn preview(name: &str) -> DatasetPreview {
        DatasetPreview {
            filename: name.into(),
            shape: (1, 1),
            columns: vec!["a".into()],
            dtypes: BTreeMap::new(),
            sample_data: Vec::new(),
            missing_values: BTreeMap::new(),
        }
    }

    #[test]
    fn startup_loads_the_file_list() {
        let mut s = DashboardState::new(&Config::default());
        assert_eq!(s.take_commands(), vec![Command::RefreshFiles]);
        assert!(s.take_commands().is_empty());
    }

    #[test]
    fn upload_event_refreshes_once() {
        let mut s = state();
        s.handle_upload_event(
            UploadEvent::Uploaded(UploadResponse {
                filename: Some("sales.csv".into()),
                ..Default::default()
            }),
            Instant::now(),
        );
        assert_eq!(s.take_commands(), vec![Command::RefreshFiles]);
        assert_eq!(s.notices.len(), 1);
    }

    #[test]
    fn selecting_loads_preview_and_starts_chat() {
        let mut s = state_with(Layout::Modal);
        s.select_file("sales.csv");
        assert_eq!(s.take_commands(), vec![Command::LoadPreview("sales.csv".into())]);
        assert_eq!(s.chat.as_ref().map(|c| c.filename()), Some("sales.csv"));

        s.select_file("sales.csv");
        assert!(s.take_commands().is_empty(), "reselecting is a no-op");
    }

    #[test]
    fn switching_file_discards_previous_results() {
        let now = Instant::now();
        let mut s = state_with(Layout::Modal);
        s.select_file("a.csv");
        s.apply_preview(Ok(preview("a.csv")), now);
        s.apply_analysis(Ok(AnalysisResponse::default()), now);
        assert!(s.preview.is_some() && s.analysis.is_some());

        s.select_file("b.csv");
        assert!(s.preview.is_none());
        assert!(s.analysis.is_none());
        assert_eq!(s.chat.as_ref().map(|c| c.filename()), Some("b.csv"));
    }

    #[test]
    fn chat_only_exists_in_the_modal_layout() {
        for layout in [Layout::Tabbed, Layout::Form] {
            let mut s = state_with(layout);
            s.select_file("a.csv");
            assert!(s.chat.is_none());
        }
    }

    #[test]
    fn analysis_for_previous_file_is_dropped_on_switch() {
        let now = Instant::now();
        let mut s = state();
        s.select_file("a.csv");
        s.analysis_promise = Some((now, Promise::from_ready(Ok(report("for-a")))));
        assert!(s.is_analyzing());

        s.select_file("b.csv");
        assert!(!s.is_analyzing(), "new file can be analyzed right away");
        s.poll(now);
        assert_eq!(s.selected.as_deref(), Some("b.csv"));
        assert!(s.analysis.is_none());
        assert_eq!(s.selected_tab, Tab::UploadManage);
    }

    #[test]
    fn queued_analysis_is_dropped_on_switch() {
        let mut s = state();
        s.select_file("a.csv");
        s.submit_analysis(AnalyzeRequest::new("a.csv"));
        s.select_file("b.csv");
        assert_eq!(s.take_commands(), vec![Command::LoadPreview("b.csv".into())]);
    }

    #[test]
    fn analysis_for_deleted_file_is_dropped() {
        let now = Instant::now();
        let mut s = state();
        s.select_file("a.csv");
        s.analysis_promise = Some((now, Promise::from_ready(Ok(report("for-a")))));

        s.apply_deleted(Ok("a.csv".into()), now);
        s.poll(now);
        assert_eq!(s.selected, None);
        assert!(s.analysis.is_none());
        assert_eq!(s.selected_tab, Tab::UploadManage);
    }

    #[test]
    fn upload_finishes_while_panel_is_hidden() {
        let now = Instant::now();
        let mut s = state();
        s.selected_tab = Tab::Analyze;
        let resp = UploadResponse {
            filename: Some("sales.csv".into()),
            ..Default::default()
        };
        s.upload.track("sales.csv", Promise::from_ready(Ok(resp)), now);
        assert!(s.has_request_in_flight());

        s.poll(now);
        assert_eq!(s.take_commands(), vec![Command::RefreshFiles]);
        assert!(!s.has_request_in_flight());

        s.poll(now);
        assert!(s.take_commands().is_empty(), "one refresh per upload");
    }

    #[test]
    fn deleting_selected_file_clears_dependents() {
        let now = Instant::now();
        let mut s = state();
        s.files = vec![file("a.csv"), file("b.csv")];
        s.select_file("a.csv");
        s.apply_preview(Ok(preview("a.csv")), now);
        s.apply_analysis(Ok(AnalysisResponse::default()), now);
        s.take_commands();

        s.confirm_delete("a.csv");
        assert_eq!(s.deleting.as_deref(), Some("a.csv"));
        assert_eq!(s.take_commands(), vec![Command::Delete("a.csv".into())]);

        s.apply_deleted(Ok("a.csv".into()), now);
        assert_eq!(s.selected, None);
        assert!(s.preview.is_none());
        assert!(s.analysis.is_none());
        assert!(s.chat.is_none());
        assert_eq!(s.deleting, None);
        assert_eq!(s.take_commands(), vec![Command::RefreshFiles]);
    }

    #[test]
    fn deleting_another_file_keeps_selection() {
        let now = Instant::now();
        let mut s = state();
        s.select_file("a.csv");
        s.apply_preview(Ok(preview("a.csv")), now);
        s.apply_deleted(Ok("b.csv".into()), now);
        assert_eq!(s.selected.as_deref(), Some("a.csv"));
        assert!(s.preview.is_some());
    }

    #[test]
    fn failures_keep_prior_state() {
        let now = Instant::now();
        let mut s = state();
        s.files = vec![file("a.csv")];
        s.apply_files(Err(RequestFailure::Network("refused".into())), now);
        assert_eq!(s.files.len(), 1);

        s.select_file("a.csv");
        s.confirm_delete("a.csv");
        s.apply_deleted(Err(RequestFailure::Server("locked".into())), now);
        assert_eq!(s.selected.as_deref(), Some("a.csv"));
        assert_eq!(s.deleting, None);
        assert!(s.notices.iter().any(|n| n.kind == NoticeKind::Error && n.text.contains("locked")));
    }

    #[test]
    fn only_one_analysis_is_queued() {
        let mut s = state();
        s.submit_analysis(AnalyzeRequest::new("a.csv"));
        assert!(s.is_analyzing());
        s.submit_analysis(AnalyzeRequest::new("a.csv").with_question("again"));
        assert_eq!(s.take_commands(), vec![Command::Analyze(AnalyzeRequest::new("a.csv"))]);
    }

    #[test]
    fn completed_analysis_opens_results_tab() {
        let mut s = state();
        s.apply_analysis(Ok(AnalysisResponse::default()), Instant::now());
        assert_eq!(s.selected_tab, Tab::Results);
    }

    #[test]
    fn notices_expire_after_four_seconds() {
        let now = Instant::now();
        let mut s = state();
        s.notify(NoticeKind::Success, "done", now);
        s.expire_notices(now + Duration::from_millis(3999));
        assert_eq!(s.notices.len(), 1);
        s.expire_notices(now + NOTICE_TTL);
        assert!(s.notices.is_empty());
    }
}
