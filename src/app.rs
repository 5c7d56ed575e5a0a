use ratatui::layout::Rect;
use ratatui::widgets::ListState;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::client::{
    DatasetMetadata, HttpQueryService, QueryReply, QueryService, TransportError,
};
use crate::conversation::Conversation;
use crate::session::Session;

/// Canned queries the backend understands, offered in the sidebar.
pub const SUGGESTIONS: [&str; 5] = [
    "Show total sales",
    "Show sales by crop",
    "Show sales by zone",
    "Show top performing crops",
    "Show crop distribution",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Transcript,
    Suggestions,
    Input,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub focus: FocusPane,

    // Conversation state, shared with the one-shot CLI surface
    pub conversation: Conversation,
    pub service: HttpQueryService,
    pub session: Session,
    pub pending_reply: Option<JoinHandle<Result<QueryReply, TransportError>>>,

    // Input line
    pub input: String,
    pub input_cursor: usize, // char index, not byte index

    // Transcript viewport
    pub transcript_scroll: u16,
    pub stick_to_bottom: bool,

    // Sidebar
    pub suggestion_state: ListState,
    pub metadata: Option<DatasetMetadata>,
    pub metadata_task: Option<JoinHandle<Result<DatasetMetadata, TransportError>>>,

    // Animation state
    pub animation_frame: u8, // 0-2 for the thinking ellipsis

    // Pane areas for mouse hit-testing (updated during render)
    pub transcript_area: Option<Rect>,
    pub suggestions_area: Option<Rect>,
}

impl App {
    pub fn new(session: Session, backend_url: &str) -> Self {
        let service = HttpQueryService::new(backend_url, Some(session.token().to_string()));

        // The sidebar fills in whenever this lands; the chat works without it
        let metadata_task = {
            let service = service.clone();
            Some(tokio::spawn(async move { service.metadata().await }))
        };

        let mut suggestion_state = ListState::default();
        suggestion_state.select(Some(0));

        Self {
            should_quit: false,
            input_mode: InputMode::Normal,
            focus: FocusPane::Input,

            conversation: Conversation::new(),
            service,
            session,
            pending_reply: None,

            input: String::new(),
            input_cursor: 0,

            transcript_scroll: 0,
            stick_to_bottom: true,

            suggestion_state,
            metadata: None,
            metadata_task,

            animation_frame: 0,

            transcript_area: None,
            suggestions_area: None,
        }
    }

    /// Submit the input line, if the conversation will take it.
    ///
    /// Empty input and input sent while a reply is outstanding are both
    /// dropped silently; the service call runs on its own task so the event
    /// loop keeps drawing.
    pub fn submit_input(&mut self) {
        let Ok(query) = self.conversation.begin(&self.input) else {
            return;
        };

        self.input.clear();
        self.input_cursor = 0;
        self.input_mode = InputMode::Normal;
        self.stick_to_bottom = true;

        let service = self.service.clone();
        self.pending_reply = Some(tokio::spawn(async move { service.ask(&query).await }));
    }

    /// Collect finished background tasks. Called on every tick.
    pub async fn poll_background_tasks(&mut self) {
        if self
            .pending_reply
            .as_ref()
            .is_some_and(|task| task.is_finished())
        {
            if let Some(task) = self.pending_reply.take() {
                let outcome = match task.await {
                    Ok(outcome) => outcome,
                    Err(err) => Err(TransportError::Network(format!("reply task failed: {err}"))),
                };
                self.conversation.complete(outcome);
                self.stick_to_bottom = true;
            }
        }

        if self
            .metadata_task
            .as_ref()
            .is_some_and(|task| task.is_finished())
        {
            if let Some(task) = self.metadata_task.take() {
                match task.await {
                    Ok(Ok(metadata)) => self.metadata = Some(metadata),
                    Ok(Err(err)) => warn!(error = %err, "metadata fetch failed"),
                    Err(err) => warn!(error = %err, "metadata task failed"),
                }
            }
        }
    }

    /// Tick animation frame (called by the Tick event).
    pub fn tick_animation(&mut self) {
        if self.conversation.is_pending() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    /// Start the session over: welcome message, empty input, top of screen.
    pub fn reset_conversation(&mut self) {
        // A straggling reply from the old session must not land in the new
        // one, so the old task is aborted outright.
        if let Some(task) = self.pending_reply.take() {
            task.abort();
        }

        self.conversation.reset();
        self.input.clear();
        self.input_cursor = 0;
        self.transcript_scroll = 0;
        self.stick_to_bottom = true;
        self.animation_frame = 0;
    }

    // Transcript viewport

    pub fn scroll_transcript_up(&mut self, lines: u16) {
        self.transcript_scroll = self.transcript_scroll.saturating_sub(lines);
        self.stick_to_bottom = false;
    }

    pub fn scroll_transcript_down(&mut self, lines: u16) {
        // Clamped against the rendered line count during the next draw
        self.transcript_scroll = self.transcript_scroll.saturating_add(lines);
        self.stick_to_bottom = false;
    }

    pub fn jump_to_top(&mut self) {
        self.transcript_scroll = 0;
        self.stick_to_bottom = false;
    }

    pub fn follow_bottom(&mut self) {
        self.stick_to_bottom = true;
    }

    // Suggestion list

    pub fn suggestion_down(&mut self) {
        let len = SUGGESTIONS.len();
        if len > 0 {
            let i = self.suggestion_state.selected().unwrap_or(0);
            self.suggestion_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn suggestion_up(&mut self) {
        let i = self.suggestion_state.selected().unwrap_or(0);
        self.suggestion_state.select(Some(i.saturating_sub(1)));
    }

    /// Copy the highlighted suggestion into the input line and start editing.
    pub fn use_selected_suggestion(&mut self) {
        if let Some(text) = self
            .suggestion_state
            .selected()
            .and_then(|i| SUGGESTIONS.get(i))
        {
            self.input = text.to_string();
            self.input_cursor = self.input.chars().count();
            self.focus = FocusPane::Input;
            self.input_mode = InputMode::Editing;
        }
    }
}
