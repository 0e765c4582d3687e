use crate::data;
use crate::format::{cell_text, format_cell_value, simplify_dtype, with_thousands};
use crate::models::DatasetPreview;
use eframe::egui;
use eframe::egui::{Color32, RichText, Ui};
use egui::{Direction, Layout};
use egui_extras::{Column, TableBuilder};
use rfd::FileDialog;
use serde_json::{Map, Value};
use tracing::{info, warn};

const PAGE_WINDOW: usize = 5;

/// Search and paging state for one preview. Both operate on the delivered
/// sample only; nothing here talks to the backend.
#[derive(Debug, Clone)]
pub struct TableView {
    search: String,
    page: usize,
    page_size: usize,
    export_status: Option<Result<String, String>>,
}

impl TableView {
    pub fn new(page_size: usize) -> Self {
        Self {
            search: String::new(),
            page: 1,
            page_size: page_size.max(1),
            export_status: None,
        }
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Any change of the term jumps back to the first page.
    pub fn set_search(&mut self, term: &str) {
        if term != self.search {
            self.search = term.to_string();
            self.page = 1;
        }
    }

    pub fn go_to(&mut self, page: usize, total_pages: usize) {
        self.page = page.clamp(1, total_pages.max(1));
    }

    /// Drops search and paging, e.g. when a different dataset is shown.
    pub fn reset(&mut self) {
        self.search.clear();
        self.page = 1;
        self.export_status = None;
    }

    pub fn filtered_indices(&self, preview: &DatasetPreview) -> Vec<usize> {
        filter_rows(preview, &self.search)
    }

    /// Indices (into the filtered list) shown on the current page.
    pub fn page_bounds(&self, filtered_len: usize) -> (usize, usize) {
        let start = ((self.page - 1) * self.page_size).min(filtered_len);
        let end = (start + self.page_size).min(filtered_len);
        (start, end)
    }
}

pub fn row_matches(row: &Map<String, Value>, columns: &[String], needle_lower: &str) -> bool {
    if needle_lower.is_empty() {
        return true;
    }
    columns.iter().any(|col| {
        row.get(col)
            .map(|v| cell_text(v).to_lowercase().contains(needle_lower))
            .unwrap_or(false)
    })
}

/// Case-insensitive substring match over every column of every sample row.
pub fn filter_rows(preview: &DatasetPreview, term: &str) -> Vec<usize> {
    let needle = term.to_lowercase();
    preview
        .sample_data
        .iter()
        .enumerate()
        .filter(|(_, row)| row_matches(row, &preview.columns, &needle))
        .map(|(i, _)| i)
        .collect()
}

pub fn total_pages(filtered_len: usize, page_size: usize) -> usize {
    filtered_len.div_ceil(page_size.max(1)).max(1)
}

/// Up to five page numbers around the current page.
pub fn page_window(current: usize, total: usize) -> Vec<usize> {
    if total <= PAGE_WINDOW {
        return (1..=total).collect();
    }
    let start = if current <= 3 {
        1
    } else if current >= total - 2 {
        total - PAGE_WINDOW + 1
    } else {
        current - 2
    };
    (start..start + PAGE_WINDOW).collect()
}

pub fn caption(shown: usize, filtered: usize, preview: &DatasetPreview) -> String {
    let mut text = format!("Showing {} of {} rows", shown, filtered);
    let sample = preview.sample_len();
    if filtered != sample {
        text.push_str(&format!(" (filtered from {})", sample));
    }
    if preview.is_truncated() {
        text.push_str(&format!(
            " • Dataset has {} total rows",
            with_thousands(preview.total_rows())
        ));
    }
    text
}

fn dtype_color(dtype: &str) -> Color32 {
    if dtype.contains("int") || dtype.contains("float") {
        Color32::from_rgb(90, 140, 230)
    } else if dtype.contains("object") || dtype.contains("str") {
        Color32::from_rgb(90, 190, 110)
    } else if dtype.contains("datetime") {
        Color32::from_rgb(170, 110, 220)
    } else {
        Color32::GRAY
    }
}

fn export_filtered(view: &mut TableView, preview: &DatasetPreview, filtered: &[usize]) {
    let stem = preview
        .filename
        .rsplit_once('.')
        .map(|(s, _)| s)
        .unwrap_or(&preview.filename);
    let Some(path) = FileDialog::new()
        .add_filter("CSV", &["csv"])
        .set_file_name(format!("{}-filtered.csv", stem))
        .save_file()
    else {
        return;
    };
    let rows: Vec<&Map<String, Value>> = filtered.iter().map(|&i| &preview.sample_data[i]).collect();
    view.export_status = Some(match data::export_rows_csv(&path, &preview.columns, &rows) {
        Ok(n) => {
            info!(rows = n, path = %path.display(), "exported table rows");
            Ok(format!("Exported {} rows to {}", n, path.display()))
        }
        Err(e) => {
            warn!(error = %e, "table export failed");
            Err(format!("Export failed: {}", e))
        }
    });
}

pub fn data_table(ui: &mut Ui, view: &mut TableView, preview: Option<&DatasetPreview>) {
    let Some(preview) = preview else {
        ui.centered_and_justified(|ui| {
            ui.label("No dataset selected. Select a file to preview its data.");
        });
        return;
    };

    let filtered = view.filtered_indices(preview);
    let pages = total_pages(filtered.len(), view.page_size);
    view.go_to(view.page, pages);
    let (start, end) = view.page_bounds(filtered.len());

    ui.horizontal(|ui| {
        ui.heading("Dataset Table View");
        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
            if ui.button("Export CSV").clicked() {
                export_filtered(view, preview, &filtered);
            }
        });
    });
    ui.label(caption(end - start, filtered.len(), preview));

    match &view.export_status {
        Some(Ok(msg)) => {
            ui.colored_label(Color32::from_rgb(80, 200, 120), msg);
        }
        Some(Err(msg)) => {
            ui.colored_label(Color32::RED, msg);
        }
        None => {}
    }

    ui.horizontal(|ui| {
        ui.label("🔍");
        let mut term = view.search.clone();
        ui.add(egui::TextEdit::singleline(&mut term).hint_text("Search data..."));
        view.set_search(&term);
    });

    // Recompute after a keystroke so this frame already shows the new result.
    let filtered = view.filtered_indices(preview);
    let (start, end) = view.page_bounds(filtered.len());
    let page_rows = &filtered[start..end];

    ui.separator();

    egui::ScrollArea::horizontal().show(ui, |ui| {
        let mut builder = TableBuilder::new(ui)
            .striped(true)
            .cell_layout(Layout::centered_and_justified(Direction::LeftToRight))
            .column(Column::auto().at_least(40.0));
        for _ in &preview.columns {
            builder = builder.column(Column::auto().at_least(80.0).resizable(true));
        }

        let table = builder.header(46.0, |mut header| {
            header.col(|ui| {
                ui.strong("#");
            });
            for column in &preview.columns {
                header.col(|ui| {
                    ui.vertical(|ui| {
                        ui.strong(column);
                        if let Some(dtype) = preview.dtypes.get(column) {
                            ui.label(
                                RichText::new(simplify_dtype(dtype))
                                    .small()
                                    .color(dtype_color(dtype)),
                            );
                        }
                        let missing = preview.missing(column);
                        if missing > 0 {
                            ui.label(
                                RichText::new(format!("{} missing", missing))
                                    .small()
                                    .color(Color32::from_rgb(230, 120, 60)),
                            );
                        }
                    });
                });
            }
        });

        table.body(|body| {
            body.rows(18.0, page_rows.len(), |mut row| {
                let pos = row.index();
                let sample_idx = page_rows[pos];
                let record = &preview.sample_data[sample_idx];
                row.col(|ui| {
                    ui.label((start + pos + 1).to_string());
                });
                for column in &preview.columns {
                    let value = record.get(column);
                    row.col(|ui| {
                        let text = format_cell_value(value);
                        let full = value.map(cell_text).unwrap_or_default();
                        let resp = ui.label(text);
                        if full.chars().count() > 50 {
                            resp.on_hover_text(full);
                        }
                    });
                }
            });
        });
    });

    if page_rows.is_empty() {
        ui.vertical_centered(|ui| {
            if view.search.is_empty() {
                ui.label("No data available");
            } else {
                ui.label("No data matches your search criteria");
            }
        });
    }

    if filtered.len() > view.page_size {
        let pages = total_pages(filtered.len(), view.page_size);
        ui.separator();
        ui.horizontal(|ui| {
            ui.label(format!(
                "Showing {} to {} of {} rows",
                start + 1,
                end,
                filtered.len()
            ));
            let current = view.page;
            if ui.add_enabled(current > 1, egui::Button::new("⏮")).clicked() {
                view.go_to(1, pages);
            }
            if ui.add_enabled(current > 1, egui::Button::new("◀")).clicked() {
                view.go_to(current - 1, pages);
            }
            for n in page_window(current, pages) {
                if ui.selectable_label(n == current, n.to_string()).clicked() {
                    view.go_to(n, pages);
                }
            }
            if ui.add_enabled(current < pages, egui::Button::new("▶")).clicked() {
                view.go_to(current + 1, pages);
            }
            if ui.add_enabled(current < pages, egui::Button::new("⏭")).clicked() {
                view.go_to(pages, pages);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn preview(rows: Vec<Value>, total: u64) -> DatasetPreview {
        DatasetPreview {
            filename: "sales.csv".into(),
            shape: (total, 2),
            columns: vec!["name".into(), "units".into()],
            dtypes: Default::default(),
            sample_data: rows
                .into_iter()
                .map(|r| r.as_object().cloned().unwrap())
                .collect(),
            missing_values: Default::default(),
        }
    }

    #[test]
    fn search_is_case_insensitive_substring() {
        let p = preview(
            vec![
                json!({"name": "xABCx", "units": 1}),
                json!({"name": "def", "units": 2}),
                json!({"name": "ghi", "units": "abc-7"}),
                json!({"name": null, "units": 3}),
            ],
            4,
        );
        assert_eq!(filter_rows(&p, "abc"), vec![0, 2]);
        assert_eq!(filter_rows(&p, "ABC"), vec![0, 2]);
        assert_eq!(filter_rows(&p, ""), vec![0, 1, 2, 3]);
        assert_eq!(filter_rows(&p, "null"), vec![3]);
        assert_eq!(filter_rows(&p, "2"), vec![1]);
    }

    #[test]
    fn changing_the_term_resets_to_page_one() {
        let mut view = TableView::new(10);
        view.go_to(4, 5);
        assert_eq!(view.page(), 4);
        view.set_search("a");
        assert_eq!(view.page(), 1);
        view.go_to(2, 5);
        view.set_search("a");
        assert_eq!(view.page(), 2, "same term keeps the page");
        view.set_search("ab");
        assert_eq!(view.page(), 1);
    }

    #[test]
    fn paging_bounds() {
        let mut view = TableView::new(20);
        assert_eq!(total_pages(45, 20), 3);
        assert_eq!(total_pages(0, 20), 1);
        view.go_to(3, 3);
        assert_eq!(view.page_bounds(45), (40, 45));
        view.go_to(9, 3);
        assert_eq!(view.page(), 3);
        view.go_to(0, 3);
        assert_eq!(view.page_bounds(45), (0, 20));
    }

    #[test]
    fn page_window_positions() {
        assert_eq!(page_window(1, 3), vec![1, 2, 3]);
        assert_eq!(page_window(2, 10), vec![1, 2, 3, 4, 5]);
        assert_eq!(page_window(6, 10), vec![4, 5, 6, 7, 8]);
        assert_eq!(page_window(9, 10), vec![6, 7, 8, 9, 10]);
    }

    #[test]
    fn caption_surfaces_sample_gap() {
        let p = preview(vec![json!({"name": "a", "units": 1}), json!({"name": "b", "units": 2})], 5000);
        assert_eq!(caption(2, 2, &p), "Showing 2 of 2 rows • Dataset has 5,000 total rows");
        assert_eq!(
            caption(1, 1, &p),
            "Showing 1 of 1 rows (filtered from 2) • Dataset has 5,000 total rows"
        );
        let full = preview(vec![json!({"name": "a", "units": 1})], 1);
        assert_eq!(caption(1, 1, &full), "Showing 1 of 1 rows");
    }
}
