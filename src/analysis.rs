use crate::chart;
use crate::error::ValidationError;
use crate::format::truncate;
use crate::models::{AnalysisResponse, AnalysisResult, AnalyzeRequest, FileInfo};
use chrono::{DateTime, Local};
use eframe::egui;
use eframe::egui::{Color32, RichText, Ui};
use rfd::FileDialog;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;

pub const NUM_QUESTION_OPTIONS: [u32; 5] = [1, 3, 5, 7, 10];
pub const DEFAULT_NUM_QUESTIONS: u32 = 5;
const OVERVIEW_MAX_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisForm {
    pub question: String,
    pub num_questions: u32,
}

impl Default for AnalysisForm {
    fn default() -> Self {
        Self {
            question: String::new(),
            num_questions: DEFAULT_NUM_QUESTIONS,
        }
    }
}

impl AnalysisForm {
    /// Full analysis: only a file is required, a blank question is left out.
    pub fn request(&self, selected: Option<&str>) -> Result<AnalyzeRequest, ValidationError> {
        let filename = selected.ok_or(ValidationError::NoFileSelected)?;
        Ok(AnalyzeRequest::new(filename)
            .with_question(&self.question)
            .with_num_questions(self.num_questions))
    }
}

/// Single-shot Q&A: file and a non-blank question are both required.
pub fn question_request(
    selected: Option<&str>,
    question: &str,
) -> Result<AnalyzeRequest, ValidationError> {
    let filename = selected.ok_or(ValidationError::NoFileSelected)?;
    if question.trim().is_empty() {
        return Err(ValidationError::EmptyQuestion);
    }
    Ok(AnalyzeRequest::new(filename).with_question(question))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultTab {
    #[default]
    Overview,
    Insights,
    Visualizations,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormAction {
    Select(String),
    Submit(AnalyzeRequest),
}

/// A pick from the file dropdown; choosing the current file is not a change.
pub fn file_choice(selected: Option<&str>, picked: &str) -> Option<FormAction> {
    (selected != Some(picked)).then(|| FormAction::Select(picked.to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultAction {
    DownloadReport,
}

pub fn report_file_name(response: &AnalysisResponse) -> String {
    format!("analysis-report-{}.md", response.report_id)
}

fn insight_markdown(index: usize, insight: &AnalysisResult) -> String {
    let mut out = format!(
        "\n### Question {}: {}\n\n**Answer:**\n{}\n\n",
        index + 1,
        insight.question,
        insight.answer
    );
    if let Some(code) = &insight.code {
        out.push_str(&format!("**Generated Code:**\n```python\n{}\n```\n\n", code));
    }
    if let Some(results) = &insight.results {
        out.push_str(&format!("**Detailed Results:**\n{}\n\n", results));
    }
    out.push_str("---\n");
    out
}

pub fn build_report_markdown(response: &AnalysisResponse, generated_at: DateTime<Local>) -> String {
    let insights: String = response
        .results
        .iter()
        .enumerate()
        .map(|(i, insight)| insight_markdown(i, insight))
        .collect();

    format!(
        "# Data Analysis Report\nReport ID: {}\nGenerated on: {}\nProcessing Time: {:.2} seconds\n\n## Summary\n{}\n\n## Analysis Insights ({} questions)\n\n{}\n\n## Visualizations\n{} interactive charts were generated during this analysis.",
        response.report_id,
        generated_at.format("%Y-%m-%d %H:%M:%S"),
        response.processing_time,
        response.summary,
        response.total_questions,
        insights,
        response.visualizations.len()
    )
    .trim()
    .to_string()
}

pub fn write_report<P: AsRef<Path>>(
    path: P,
    response: &AnalysisResponse,
    generated_at: DateTime<Local>,
) -> io::Result<()> {
    fs::write(path, build_report_markdown(response, generated_at))
}

/// Asks where to save and writes the report. `Ok(None)` when the dialog was
/// cancelled.
pub fn save_report(response: &AnalysisResponse) -> io::Result<Option<PathBuf>> {
    let Some(path) = FileDialog::new()
        .set_file_name(report_file_name(response))
        .add_filter("Markdown", &["md"])
        .save_file()
    else {
        return Ok(None);
    };
    write_report(&path, response, Local::now())?;
    info!(path = %path.display(), "analysis report saved");
    Ok(Some(path))
}

/// "Start Analysis" form with a file dropdown.
pub fn analysis_form(
    ui: &mut Ui,
    form: &mut AnalysisForm,
    files: &[FileInfo],
    selected: Option<&str>,
    busy: bool,
) -> Option<FormAction> {
    let mut action = None;

    ui.heading("AI-Powered Analysis");
    ui.horizontal(|ui| {
        ui.label("Dataset:");
        egui::ComboBox::from_id_salt("analysis_file")
            .selected_text(selected.unwrap_or("Choose a file..."))
            .show_ui(ui, |ui| {
                for file in files {
                    let name = file.filename.as_str();
                    if ui.selectable_label(selected == Some(name), name).clicked() {
                        action = file_choice(selected, name);
                    }
                }
            });
    });
    if files.is_empty() {
        ui.colored_label(Color32::YELLOW, "Upload a file in Upload & Manage first.");
    }
    ui.add_space(6.0);

    ui.label("Custom question (optional)");
    ui.add(
        egui::TextEdit::multiline(&mut form.question)
            .hint_text("Leave blank for a comprehensive analysis of the dataset")
            .desired_rows(3)
            .desired_width(f32::INFINITY),
    );

    ui.horizontal(|ui| {
        ui.label("Number of questions:");
        egui::ComboBox::from_id_salt("num_questions")
            .selected_text(form.num_questions.to_string())
            .show_ui(ui, |ui| {
                for n in NUM_QUESTION_OPTIONS {
                    ui.selectable_value(&mut form.num_questions, n, n.to_string());
                }
            });
    });
    ui.add_space(6.0);

    ui.horizontal(|ui| {
        let label = if busy { "Analyzing..." } else { "Start Analysis" };
        let enabled = !busy && selected.is_some();
        if ui.add_enabled(enabled, egui::Button::new(label)).clicked() {
            if let Ok(request) = form.request(selected) {
                action = Some(FormAction::Submit(request));
            }
        }
        if busy {
            ui.spinner();
        }
    });

    action
}

fn metric(ui: &mut Ui, title: &str, value: String) {
    egui::Frame::group(ui.style()).show(ui, |ui| {
        ui.vertical(|ui| {
            ui.label(RichText::new(title).small());
            ui.label(RichText::new(value).heading().strong());
        });
    });
}

fn insight_card(ui: &mut Ui, index: usize, insight: &AnalysisResult) {
    egui::Frame::group(ui.style()).show(ui, |ui| {
        ui.set_min_width(ui.available_width());
        ui.label(RichText::new(format!("Question {}: {}", index + 1, insight.question)).strong());
        ui.label(&insight.answer);
        if let Some(code) = &insight.code {
            egui::CollapsingHeader::new("Generated Code")
                .id_salt(("insight_code", index))
                .show(ui, |ui| {
                    let mut text = code.as_str();
                    ui.add(
                        egui::TextEdit::multiline(&mut text)
                            .code_editor()
                            .desired_width(f32::INFINITY),
                    );
                });
        }
        if let Some(results) = &insight.results {
            egui::CollapsingHeader::new("Detailed Results")
                .id_salt(("insight_results", index))
                .show(ui, |ui| {
                    ui.label(RichText::new(results).monospace());
                });
        }
    });
}

fn visualization_cards(ui: &mut Ui, response: &AnalysisResponse, salt: &str) {
    if response.visualizations.is_empty() {
        ui.vertical_centered(|ui| {
            ui.label("No visualizations were generated for this analysis.");
        });
        return;
    }
    for (i, viz) in response.visualizations.iter().enumerate() {
        egui::Frame::group(ui.style()).show(ui, |ui| {
            ui.horizontal(|ui| {
                ui.strong(viz.label());
                if let Some(kind) = &viz.kind {
                    ui.label(RichText::new(kind).small().color(Color32::GRAY));
                }
            });
            chart::chart(ui, (salt, i), Some(&viz.data), chart::DEFAULT_HEIGHT);
        });
        ui.add_space(6.0);
    }
}

/// Summary header plus the three result tabs.
pub fn result_view(
    ui: &mut Ui,
    response: &AnalysisResponse,
    tab: &mut ResultTab,
) -> Option<ResultAction> {
    let mut action = None;

    ui.horizontal(|ui| {
        ui.heading("Analysis Complete");
        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
            if ui.button("⬇ Download Report").clicked() {
                action = Some(ResultAction::DownloadReport);
            }
        });
    });
    ui.label(&response.summary);
    ui.horizontal(|ui| {
        metric(ui, "Questions Analyzed", response.total_questions.to_string());
        metric(ui, "Visualizations", response.visualizations.len().to_string());
        metric(ui, "Processing Time", format!("{:.1}s", response.processing_time));
    });
    ui.separator();

    ui.horizontal(|ui| {
        ui.selectable_value(tab, ResultTab::Overview, "Overview");
        ui.selectable_value(tab, ResultTab::Insights, "Detailed Insights");
        ui.selectable_value(tab, ResultTab::Visualizations, "Visualizations");
    });
    ui.separator();

    egui::ScrollArea::vertical()
        .id_salt("analysis_result")
        .auto_shrink([false, false])
        .show(ui, |ui| match tab {
            ResultTab::Overview => {
                ui.label(format!(
                    "This analysis examined your dataset through {} different analytical lenses.",
                    response.total_questions
                ));
                for insight in &response.results {
                    ui.add_space(4.0);
                    ui.label(RichText::new(&insight.question).strong());
                    ui.label(truncate(&insight.answer, OVERVIEW_MAX_CHARS));
                }
            }
            ResultTab::Insights => {
                for (i, insight) in response.results.iter().enumerate() {
                    insight_card(ui, i, insight);
                    ui.add_space(6.0);
                }
            }
            ResultTab::Visualizations => visualization_cards(ui, response, "result_viz"),
        });

    action
}

/// Question box with answer, generated code and charts underneath.
pub fn question_panel(
    ui: &mut Ui,
    question: &mut String,
    selected: Option<&str>,
    busy: bool,
    response: Option<&AnalysisResponse>,
    error: Option<&str>,
) -> Option<AnalyzeRequest> {
    let mut submitted = None;

    ui.heading("Ask a Question");
    ui.horizontal(|ui| {
        let input = ui.add_enabled(
            !busy,
            egui::TextEdit::singleline(question)
                .hint_text("e.g. Which region had the highest sales?")
                .desired_width(ui.available_width() - 80.0),
        );
        let enter = input.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
        let ready = !busy && selected.is_some() && !question.trim().is_empty();
        let clicked = ui
            .add_enabled(ready, egui::Button::new(if busy { "Asking..." } else { "Ask" }))
            .clicked();
        if (clicked || enter) && ready {
            submitted = question_request(selected, question).ok();
        }
    });
    if selected.is_none() {
        ui.label(RichText::new("Select a file to ask questions about it.").color(Color32::GRAY));
    }
    if busy {
        ui.horizontal(|ui| {
            ui.spinner();
            ui.label("Analyzing...");
        });
    }
    if let Some(err) = error {
        ui.colored_label(Color32::RED, err);
    }

    if let Some(resp) = response {
        ui.separator();
        let answer = resp
            .results
            .first()
            .map(|r| r.answer.as_str())
            .filter(|a| !a.is_empty())
            .unwrap_or(resp.summary.as_str());
        ui.label(RichText::new("Answer").strong());
        crate::chat::render_segments(ui, answer);
        for (i, insight) in resp.results.iter().enumerate() {
            if let Some(code) = &insight.code {
                egui::CollapsingHeader::new("Code")
                    .id_salt(("qa_code", i))
                    .show(ui, |ui| {
                        ui.label(RichText::new(code).monospace());
                    });
            }
        }
        visualization_cards(ui, resp, "qa_viz");
    }

    submitted
}
