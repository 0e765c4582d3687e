use crate::error::ClientError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FileInfo {
    pub filename: String,
    pub size: u64,
    pub upload_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<u64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct FileListResponse {
    #[serde(default)]
    pub files: Vec<FileInfo>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct UploadResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub rows: Option<u64>,
    #[serde(default)]
    pub columns: Option<u64>,
}

/// Error payload used by the backend for HTTP-level failures.
#[derive(Deserialize, Debug, Clone)]
pub struct ErrorDetail {
    pub detail: Value,
}

impl ErrorDetail {
    pub fn message(&self) -> String {
        match &self.detail {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DatasetPreview {
    pub filename: String,
    /// (rows, columns) of the full dataset, not of the sample.
    pub shape: (u64, u64),
    pub columns: Vec<String>,
    #[serde(default)]
    pub dtypes: BTreeMap<String, String>,
    #[serde(default)]
    pub sample_data: Vec<serde_json::Map<String, Value>>,
    #[serde(default)]
    pub missing_values: BTreeMap<String, u64>,
}

impl DatasetPreview {
    pub fn total_rows(&self) -> u64 {
        self.shape.0
    }

    pub fn sample_len(&self) -> usize {
        self.sample_data.len()
    }

    pub fn is_truncated(&self) -> bool {
        (self.sample_data.len() as u64) < self.shape.0
    }

    pub fn missing(&self, column: &str) -> u64 {
        self.missing_values.get(column).copied().unwrap_or(0)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AnalyzeRequest {
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_questions: Option<u32>,
}

impl AnalyzeRequest {
    pub fn new(filename: &str) -> Self {
        AnalyzeRequest {
            filename: filename.to_string(),
            question: None,
            num_questions: None,
        }
    }

    /// Blank questions are dropped so the backend picks its default analysis.
    pub fn with_question(mut self, question: &str) -> Self {
        let trimmed = question.trim();
        self.question = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        };
        self
    }

    pub fn with_num_questions(mut self, n: u32) -> Self {
        self.num_questions = Some(n);
        self
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CodeBlock {
    #[serde(rename = "type", default)]
    pub language: String,
    pub content: String,
}

/// A chart-library figure spec plus whatever labelling the backend attached.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Visualization {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default)]
    pub data: Value,
}

impl Visualization {
    pub fn label(&self) -> String {
        self.title
            .clone()
            .or_else(|| self.filename.clone())
            .unwrap_or_else(|| "Chart".to_string())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct AnalysisResult {
    pub question: String,
    pub answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<String>,
    #[serde(default)]
    pub visualizations: Vec<Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct AnalysisResponse {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub results: Vec<AnalysisResult>,
    #[serde(default)]
    pub total_questions: u32,
    #[serde(default)]
    pub processing_time: f64,
    #[serde(default)]
    pub visualizations: Vec<Visualization>,
    #[serde(default)]
    pub report_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_blocks: Option<Vec<CodeBlock>>,
}

impl AnalysisResponse {
    /// Turns either backend response shape into the insight-list shape.
    /// `success: false` is reported as a server-side rejection.
    pub fn normalize(mut self, request: &AnalyzeRequest) -> Result<Self, ClientError> {
        if self.success == Some(false) {
            let msg = self
                .error
                .clone()
                .unwrap_or_else(|| "Analysis failed".to_string());
            return Err(ClientError::Rejected(msg));
        }

        let blocks = self.code_blocks.take().unwrap_or_default();
        if self.results.is_empty() && (self.result.is_some() || !blocks.is_empty()) {
            let question = request
                .question
                .clone()
                .unwrap_or_else(|| "Comprehensive analysis".to_string());
            let code = if blocks.is_empty() {
                None
            } else {
                Some(
                    blocks
                        .iter()
                        .map(|b| format!("# {}\n{}", b.language, b.content))
                        .collect::<Vec<_>>()
                        .join("\n\n"),
                )
            };
            self.results.push(AnalysisResult {
                question,
                answer: self.result.clone().unwrap_or_default(),
                code,
                results: None,
                visualizations: Vec::new(),
            });
        }

        if self.summary.is_empty() {
            if let Some(result) = &self.result {
                self.summary = result.clone();
            }
        }
        if self.total_questions == 0 {
            self.total_questions = self.results.len() as u32;
        }
        if self.report_id.is_empty() {
            self.report_id = chrono::Local::now().format("%Y%m%d%H%M%S").to_string();
        }
        Ok(self)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub filename: String,
    pub question: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ChatResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub visualizations: Option<Vec<Visualization>>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealPhase {
    Pending,
    Revealing,
    Settled,
}

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub id: u64,
    pub role: Role,
    pub content: String,
    pub visualizations: Vec<Visualization>,
    pub phase: RevealPhase,
}

impl ChatMessage {
    pub fn is_streaming(&self) -> bool {
        self.phase != RevealPhase::Settled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn file_list_tolerates_missing_counts() {
        let parsed: FileListResponse = serde_json::from_value(json!({
            "files": [
                {"filename": "sales.csv", "size": 2048, "upload_date": "2024-01-01", "rows": 100, "columns": 4},
                {"filename": "raw.xlsx", "size": 10, "upload_date": "2024-01-02 10:00:00"}
            ]
        }))
        .unwrap();
        assert_eq!(parsed.files.len(), 2);
        assert_eq!(parsed.files[0].rows, Some(100));
        assert_eq!(parsed.files[1].columns, None);

        let empty: FileListResponse = serde_json::from_value(json!({})).unwrap();
        assert!(empty.files.is_empty());
    }

    #[test]
    fn analyze_request_omits_blank_question() {
        let req = AnalyzeRequest::new("sales.csv")
            .with_question("   ")
            .with_num_questions(5);
        let body = serde_json::to_value(&req).unwrap();
        assert_eq!(body, json!({"filename": "sales.csv", "num_questions": 5}));

        let req = AnalyzeRequest::new("sales.csv").with_question(" Top region? ");
        let body = serde_json::to_value(&req).unwrap();
        assert_eq!(body, json!({"filename": "sales.csv", "question": "Top region?"}));
    }

    #[test]
    fn insight_shape_passes_through() {
        let resp: AnalysisResponse = serde_json::from_value(json!({
            "summary": "Two insights",
            "results": [
                {"question": "q1", "answer": "a1", "visualizations": []},
                {"question": "q2", "answer": "a2", "code": "df.describe()", "visualizations": ["v"]}
            ],
            "total_questions": 2,
            "processing_time": 3.25,
            "visualizations": [{"title": "Sales", "type": "bar", "data": {"data": []}}],
            "report_id": "r-1"
        }))
        .unwrap();
        let req = AnalyzeRequest::new("sales.csv");
        let norm = resp.clone().normalize(&req).unwrap();
        assert_eq!(norm, resp);
        assert_eq!(norm.visualizations[0].kind.as_deref(), Some("bar"));
    }

    #[test]
    fn success_shape_is_converted_to_one_insight() {
        let resp: AnalysisResponse = serde_json::from_value(json!({
            "success": true,
            "result": "Analysis completed successfully for sales.csv.",
            "code_blocks": [{"type": "python", "content": "print(1)"}],
            "visualizations": [{"filename": "a.json", "data": {}, "created_at": "2024-01-01 00:00:00"}]
        }))
        .unwrap();
        let req = AnalyzeRequest::new("sales.csv").with_question("Which region sells most?");
        let norm = resp.normalize(&req).unwrap();
        assert_eq!(norm.results.len(), 1);
        assert_eq!(norm.results[0].question, "Which region sells most?");
        assert_eq!(norm.results[0].code.as_deref(), Some("# python\nprint(1)"));
        assert_eq!(norm.total_questions, 1);
        assert_eq!(norm.summary, "Analysis completed successfully for sales.csv.");
        assert!(!norm.report_id.is_empty());
        assert_eq!(norm.visualizations[0].label(), "a.json");
    }

    #[test]
    fn success_false_is_rejected() {
        let resp: AnalysisResponse =
            serde_json::from_value(json!({"success": false, "error": "File not found"})).unwrap();
        let err = resp.normalize(&AnalyzeRequest::new("x.csv")).unwrap_err();
        assert!(matches!(err, ClientError::Rejected(ref m) if m == "File not found"));
    }

    #[test]
    fn preview_reports_truncated_sample() {
        let preview: DatasetPreview = serde_json::from_value(json!({
            "filename": "sales.csv",
            "shape": [1000, 2],
            "columns": ["a", "b"],
            "dtypes": {"a": "int64", "b": "object"},
            "sample_data": [{"a": 1, "b": "x"}],
            "missing_values": {"b": 3}
        }))
        .unwrap();
        assert!(preview.is_truncated());
        assert_eq!(preview.missing("b"), 3);
        assert_eq!(preview.missing("a"), 0);
    }
}
