use crate::chart;
use crate::client::{self, ApiClient};
use crate::error::{RequestFailure, ValidationError};
use crate::models::{ChatMessage, ChatRequest, ChatResponse, RevealPhase, Role, Visualization};
use eframe::egui;
use eframe::egui::{Color32, RichText, Ui};
use poll_promise::Promise;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub const MODEL_CALL_MARKER: &str = ">> Calling Model:";
pub const FINAL_ANSWER_MARKER: &str = ">> I now have the final answer:";
const STEP_MARKER: &str = ">>";

const FALLBACK_ANSWER: &str = "Analysis completed successfully.";
const SERVER_APOLOGY: &str = "I apologize, but I encountered an error while analyzing your question. Please try rephrasing your question or check if the dataset is properly loaded.";
const NETWORK_APOLOGY: &str = "I apologize, but I'm having trouble connecting to the analysis service. Please check your connection and try again.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    ModelCall(String),
    Reasoning(String),
    FinalAnswer { preamble: Option<String>, answer: String },
    Text(String),
}

/// Splits before every `>>` marker. Text without markers is one `Text` segment.
pub fn segments(content: &str) -> Vec<Segment> {
    let mut cuts: Vec<usize> = content.match_indices(STEP_MARKER).map(|(i, _)| i).collect();
    if cuts.first() != Some(&0) {
        cuts.insert(0, 0);
    }
    cuts.push(content.len());

    cuts.windows(2)
        .map(|w| &content[w[0]..w[1]])
        .filter(|s| !s.trim().is_empty())
        .map(classify)
        .collect()
}

fn classify(section: &str) -> Segment {
    if section.contains(MODEL_CALL_MARKER) {
        Segment::ModelCall(section.trim().to_string())
    } else if let Some((before, after)) = section.split_once(FINAL_ANSWER_MARKER) {
        let before = before.trim();
        Segment::FinalAnswer {
            preamble: (!before.is_empty()).then(|| before.to_string()),
            answer: after.trim().to_string(),
        }
    } else if section.contains(STEP_MARKER) {
        Segment::Reasoning(section.trim().to_string())
    } else {
        Segment::Text(section.trim().to_string())
    }
}

/// Word-by-word reveal of an already complete answer.
struct Reveal {
    message_id: u64,
    full: String,
    words: Vec<String>,
    shown: usize,
    next_at: Instant,
    visualizations: Vec<Visualization>,
}

pub struct ChatSession {
    filename: String,
    messages: Vec<ChatMessage>,
    next_id: u64,
    pub input: String,
    interval: Duration,
    reveals: Vec<Reveal>,
    promise: Option<(u64, Promise<Result<ChatResponse, RequestFailure>>)>,
}

impl ChatSession {
    pub fn new(filename: &str, interval: Duration) -> Self {
        let mut session = Self {
            filename: filename.to_string(),
            messages: Vec::new(),
            next_id: 1,
            input: String::new(),
            interval,
            reveals: Vec::new(),
            promise: None,
        };
        let welcome = format!(
            "Hello! I'm ready to help you analyze your dataset \"{}\". I can provide detailed analysis, answer questions about your data, and create visualizations.\n\nWhat would you like to explore?",
            filename
        );
        session.push(Role::Assistant, welcome, RevealPhase::Settled);
        session
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_loading(&self) -> bool {
        self.promise.is_some()
    }

    pub fn can_submit(&self) -> bool {
        !self.is_loading() && !self.filename.is_empty() && !self.input.trim().is_empty()
    }

    fn push(&mut self, role: Role, content: String, phase: RevealPhase) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.messages.push(ChatMessage {
            id,
            role,
            content,
            visualizations: Vec::new(),
            phase,
        });
        id
    }

    fn message_mut(&mut self, id: u64) -> Option<&mut ChatMessage> {
        self.messages.iter_mut().find(|m| m.id == id)
    }

    /// Appends the user's question and an empty assistant placeholder.
    /// Returns the placeholder's id.
    pub fn push_exchange(&mut self) -> Result<(u64, String), ValidationError> {
        if self.filename.is_empty() {
            return Err(ValidationError::NoFileSelected);
        }
        let question = self.input.trim().to_string();
        if question.is_empty() {
            return Err(ValidationError::EmptyQuestion);
        }
        self.push(Role::User, question.clone(), RevealPhase::Settled);
        let assistant_id = self.push(Role::Assistant, String::new(), RevealPhase::Pending);
        self.input.clear();
        Ok((assistant_id, question))
    }

    /// Sends the current input. Ignored while a request is outstanding.
    pub fn submit(&mut self, client: &ApiClient) -> Result<(), ValidationError> {
        if self.is_loading() {
            return Ok(());
        }
        let (assistant_id, question) = self.push_exchange()?;
        debug!(file = %self.filename, "chat question sent");
        let request = ChatRequest {
            filename: self.filename.clone(),
            question,
        };
        self.promise = Some((assistant_id, client::chat_promise(client.clone(), request)));
        Ok(())
    }

    /// Starts revealing the reply into the placeholder `message_id`.
    pub fn deliver(
        &mut self,
        message_id: u64,
        result: Result<ChatResponse, RequestFailure>,
        now: Instant,
    ) {
        let (full, visualizations) = match result {
            Ok(resp) if resp.success => (
                resp.answer
                    .filter(|a| !a.is_empty())
                    .unwrap_or_else(|| FALLBACK_ANSWER.to_string()),
                resp.visualizations.unwrap_or_default(),
            ),
            Ok(resp) => {
                warn!(error = ?resp.error, "chat request reported failure");
                (SERVER_APOLOGY.to_string(), Vec::new())
            }
            Err(err) => {
                warn!(error = %err, "chat request failed");
                let text = if err.is_network() {
                    NETWORK_APOLOGY
                } else {
                    SERVER_APOLOGY
                };
                (text.to_string(), Vec::new())
            }
        };

        let Some(msg) = self.message_mut(message_id) else {
            return;
        };
        msg.phase = RevealPhase::Revealing;
        let words = full.split(' ').map(str::to_string).collect();
        self.reveals.push(Reveal {
            message_id,
            full,
            words,
            shown: 0,
            next_at: now + self.interval,
            visualizations,
        });
    }

    /// Emits every word that is due. Visualizations are attached on the tick
    /// after the last word, together with the switch to `Settled`.
    pub fn tick(&mut self, now: Instant) -> bool {
        let interval = self.interval;
        let mut changed = false;
        let mut settled = Vec::new();

        for (idx, reveal) in self.reveals.iter_mut().enumerate() {
            while reveal.next_at <= now {
                reveal.next_at += interval;
                changed = true;
                if reveal.shown < reveal.words.len() {
                    reveal.shown += 1;
                    let prefix = reveal.words[..reveal.shown].join(" ");
                    if let Some(msg) = self.messages.iter_mut().find(|m| m.id == reveal.message_id) {
                        msg.content = prefix;
                    }
                } else {
                    if let Some(msg) = self.messages.iter_mut().find(|m| m.id == reveal.message_id) {
                        msg.content = reveal.full.clone();
                        msg.visualizations = std::mem::take(&mut reveal.visualizations);
                        msg.phase = RevealPhase::Settled;
                    }
                    settled.push(idx);
                    break;
                }
            }
        }

        for idx in settled.into_iter().rev() {
            self.reveals.remove(idx);
        }
        changed
    }

    pub fn poll(&mut self, now: Instant) {
        let ready = self
            .promise
            .as_ref()
            .and_then(|(id, promise)| promise.ready().cloned().map(|r| (*id, r)));
        if let Some((id, result)) = ready {
            self.promise = None;
            self.deliver(id, result, now);
        }
        self.tick(now);
    }

    pub fn next_wakeup(&self) -> Option<Instant> {
        self.reveals.iter().map(|r| r.next_at).min()
    }
}

fn segment_frame(ui: &mut Ui, accent: Color32, add_contents: impl FnOnce(&mut Ui)) {
    egui::Frame::group(ui.style())
        .fill(accent.gamma_multiply(0.15))
        .stroke(egui::Stroke::new(1.0, accent))
        .show(ui, |ui| {
            ui.set_min_width(ui.available_width());
            add_contents(ui);
        });
}

pub fn render_segments(ui: &mut Ui, content: &str) {
    for segment in segments(content) {
        match segment {
            Segment::ModelCall(text) => {
                segment_frame(ui, Color32::from_rgb(90, 140, 230), |ui| {
                    ui.label(RichText::new(text).small());
                });
            }
            Segment::FinalAnswer { preamble, answer } => {
                if let Some(pre) = preamble {
                    ui.label(pre);
                }
                segment_frame(ui, Color32::from_rgb(80, 200, 120), |ui| {
                    ui.label(RichText::new("🎯 Final Answer:").strong());
                    ui.label(answer);
                });
            }
            Segment::Reasoning(text) => {
                segment_frame(ui, Color32::GRAY, |ui| {
                    ui.label(RichText::new(text).small());
                });
            }
            Segment::Text(text) => {
                ui.label(text);
            }
        }
    }
}

fn message_view(ui: &mut Ui, msg: &ChatMessage) {
    match msg.role {
        Role::User => {
            ui.with_layout(egui::Layout::top_down(egui::Align::Max), |ui| {
                egui::Frame::group(ui.style())
                    .fill(Color32::from_rgb(37, 99, 235))
                    .show(ui, |ui| {
                        ui.label(RichText::new("You").small().color(Color32::LIGHT_BLUE));
                        ui.label(RichText::new(&msg.content).color(Color32::WHITE));
                    });
            });
        }
        Role::Assistant => {
            ui.horizontal(|ui| {
                ui.label(RichText::new("AI Assistant").strong().color(Color32::LIGHT_BLUE));
                if msg.is_streaming() {
                    ui.spinner();
                }
            });
            egui::Frame::group(ui.style()).show(ui, |ui| {
                ui.set_min_width(ui.available_width());
                if msg.content.is_empty() {
                    ui.horizontal(|ui| {
                        ui.spinner();
                        ui.label("Analyzing your question...");
                    });
                } else {
                    render_segments(ui, &msg.content);
                    if msg.phase == RevealPhase::Revealing {
                        ui.label(RichText::new("▌").color(Color32::LIGHT_BLUE));
                    }
                }
            });
            if !msg.visualizations.is_empty() {
                ui.label(RichText::new("📊 Generated Visualizations").strong());
                for (i, viz) in msg.visualizations.iter().enumerate() {
                    egui::Frame::group(ui.style()).show(ui, |ui| {
                        ui.strong(viz.label());
                        chart::chart(ui, ("chat_viz", msg.id, i), Some(&viz.data), 400.0);
                    });
                }
            }
        }
    }
}

pub fn chat_panel(ui: &mut Ui, session: &mut ChatSession, client: &ApiClient) {
    let now = Instant::now();
    session.poll(now);

    ui.heading("✨ AI Analysis Chat");
    ui.label("Ask questions about your data and get detailed AI-powered insights");
    ui.separator();

    let input_height = 40.0;
    egui::ScrollArea::vertical()
        .id_salt("chat_messages")
        .stick_to_bottom(true)
        .auto_shrink([false, false])
        .max_height((ui.available_height() - input_height).max(100.0))
        .show(ui, |ui| {
            for msg in session.messages() {
                message_view(ui, msg);
                ui.add_space(8.0);
            }
        });

    ui.separator();
    let mut error = None;
    ui.horizontal(|ui| {
        let input = ui.add_enabled(
            !session.is_loading(),
            egui::TextEdit::singleline(&mut session.input)
                .hint_text("Ask about your data: patterns, insights, visualizations...")
                .desired_width(ui.available_width() - 60.0),
        );
        let enter = input.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
        let label = if session.is_loading() { "…" } else { "Send" };
        let send = ui
            .add_enabled(session.can_submit(), egui::Button::new(label))
            .clicked();
        if (send || enter) && session.can_submit() {
            if let Err(e) = session.submit(client) {
                error = Some(e);
            }
            input.request_focus();
        }
    });
    if let Some(e) = error {
        ui.colored_label(Color32::RED, e.to_string());
    }

    if let Some(at) = session.next_wakeup() {
        ui.ctx()
            .request_repaint_after(at.saturating_duration_since(Instant::now()));
    }
    if session.is_loading() {
        ui.ctx().request_repaint_after(Duration::from_millis(100));
    }
}
