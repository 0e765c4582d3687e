use crate::format::{FileKind, file_badge, file_kind, format_date, format_file_size, format_shape};
use crate::models::FileInfo;
use chrono::Local;
use eframe::egui;
use eframe::egui::{Color32, RichText, Ui};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileListAction {
    Select(String),
    Delete(String),
    Refresh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LibraryStats {
    pub total_files: usize,
    pub total_size: u64,
    pub csv_files: usize,
    pub excel_files: usize,
}

pub fn library_stats(files: &[FileInfo]) -> LibraryStats {
    files.iter().fold(LibraryStats::default(), |mut acc, f| {
        acc.total_files += 1;
        acc.total_size += f.size;
        match file_kind(&f.filename) {
            FileKind::Csv => acc.csv_files += 1,
            FileKind::Excel => acc.excel_files += 1,
            FileKind::Other => {}
        }
        acc
    })
}

/// What a file card shows, computed without touching the UI.
#[derive(Debug, Clone, PartialEq)]
pub struct FileCard {
    pub filename: String,
    pub badge: String,
    pub subtitle: String,
    pub shape: Option<String>,
    pub selected: bool,
}

pub fn file_cards(files: &[FileInfo], selected: Option<&str>) -> Vec<FileCard> {
    let now = Local::now();
    files
        .iter()
        .map(|f| FileCard {
            filename: f.filename.clone(),
            badge: file_badge(&f.filename),
            subtitle: format!(
                "{} • {}",
                format_file_size(f.size),
                format_date(&f.upload_date, now)
            ),
            shape: format_shape(f.rows, f.columns),
            selected: selected == Some(f.filename.as_str()),
        })
        .collect()
}

fn badge_color(badge: &str) -> Color32 {
    match badge {
        "CSV" => Color32::from_rgb(80, 180, 100),
        "XLSX" | "XLS" => Color32::from_rgb(70, 130, 220),
        _ => Color32::GRAY,
    }
}

/// Stateless list over externally owned files. `deleting` disables the delete
/// button of the row whose removal is in flight; rows only disappear once the
/// caller refreshes `files`.
pub fn file_list(
    ui: &mut Ui,
    files: &[FileInfo],
    selected: Option<&str>,
    deleting: Option<&str>,
    refreshing: bool,
) -> Option<FileListAction> {
    let mut action = None;
    let stats = library_stats(files);

    ui.horizontal(|ui| {
        ui.heading("File Library");
        ui.label(format!(
            "{} files • {} total",
            stats.total_files,
            format_file_size(stats.total_size)
        ));
        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
            let label = if refreshing { "Refreshing..." } else { "⟳ Refresh" };
            if ui.add_enabled(!refreshing, egui::Button::new(label)).clicked() {
                action = Some(FileListAction::Refresh);
            }
        });
    });
    ui.separator();

    if files.is_empty() {
        ui.vertical_centered(|ui| {
            ui.label(RichText::new("No files uploaded yet").strong());
            ui.label("Upload your first data file to get started. Supported formats include CSV and Excel files.");
        });
        return action;
    }

    ui.label("Click on a file to select it for analysis.");

    for card in file_cards(files, selected) {
        let frame = if card.selected {
            egui::Frame::group(ui.style()).fill(ui.visuals().selection.bg_fill.gamma_multiply(0.4))
        } else {
            egui::Frame::group(ui.style())
        };
        frame.show(ui, |ui| {
            ui.set_min_width(ui.available_width());
            ui.horizontal(|ui| {
                ui.label(RichText::new(&card.badge).color(badge_color(&card.badge)).strong());
                let title = if card.selected {
                    format!("✔ {}", card.filename)
                } else {
                    card.filename.clone()
                };
                if ui.selectable_label(card.selected, title).clicked() {
                    action = Some(FileListAction::Select(card.filename.clone()));
                }
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    let busy = deleting == Some(card.filename.as_str());
                    let label = if busy { "Deleting..." } else { "🗑" };
                    if ui.add_enabled(!busy, egui::Button::new(label)).clicked() {
                        action = Some(FileListAction::Delete(card.filename.clone()));
                    }
                });
            });
            ui.label(&card.subtitle);
            if let Some(shape) = &card.shape {
                ui.label(shape);
            }
        });
    }

    ui.add_space(8.0);
    ui.collapsing("Library Statistics", |ui| {
        egui::Grid::new("library_stats_grid").show(ui, |ui| {
            ui.label("Total Files:");
            ui.label(stats.total_files.to_string());
            ui.end_row();
            ui.label("Total Size:");
            ui.label(format_file_size(stats.total_size));
            ui.end_row();
            ui.label("CSV Files:");
            ui.label(stats.csv_files.to_string());
            ui.end_row();
            ui.label("Excel Files:");
            ui.label(stats.excel_files.to_string());
            ui.end_row();
        });
    });

    action
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sales() -> FileInfo {
        FileInfo {
            filename: "sales.csv".into(),
            size: 2048,
            upload_date: "2024-01-01".into(),
            rows: Some(100),
            columns: Some(4),
        }
    }

    #[test]
    fn single_file_renders_one_card() {
        let files = vec![sales()];
        let cards = file_cards(&files, None);
        assert_eq!(cards.len(), 1);
        let card = &cards[0];
        assert_eq!(card.filename, "sales.csv");
        assert!(card.subtitle.starts_with("2 KB • "));
        assert_eq!(card.shape.as_deref(), Some("100 rows • 4 columns"));
        assert_eq!(card.badge, "CSV");
        assert!(!card.selected);
    }

    #[test]
    fn selection_marks_exactly_one_card() {
        let mut other = sales();
        other.filename = "budget.xlsx".into();
        other.rows = None;
        let files = vec![sales(), other];
        let cards = file_cards(&files, Some("budget.xlsx"));
        assert_eq!(cards.iter().filter(|c| c.selected).count(), 1);
        assert!(cards[1].selected);
        assert_eq!(cards[1].shape, None);
    }

    #[test]
    fn stats_count_kinds_and_bytes() {
        let mut excel = sales();
        excel.filename = "b.XLS".into();
        excel.size = 1000;
        let mut other = sales();
        other.filename = "notes.txt".into();
        other.size = 1;
        let stats = library_stats(&[sales(), excel, other]);
        assert_eq!(
            stats,
            LibraryStats {
                total_files: 3,
                total_size: 3049,
                csv_files: 1,
                excel_files: 1,
            }
        );
    }
}
