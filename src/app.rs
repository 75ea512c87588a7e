use std::sync::Arc;

use ratatui::layout::Rect;
use ratatui::widgets::ListState;
use tokio::sync::watch;

use crate::config::Config;
use crate::controller::ChatController;
use crate::gemini::GeminiClient;
use crate::state::UiState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,

    // Prompt input
    pub input: String,
    pub cursor: usize, // char position in input

    // Response view
    pub response_scroll: u16,
    pub response_height: u16,
    pub total_response_lines: u16,
    // While a response streams in, keep the view pinned to the bottom
    // until the user scrolls manually.
    pub follow_stream: bool,
    // Response pane area for mouse hit-testing (updated during render)
    pub response_area: Option<Rect>,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Model picker state
    pub show_model_picker: bool,
    pub available_models: Vec<String>,
    pub model_picker_state: ListState,

    // Remote call plumbing
    pub client: GeminiClient,
    pub controller: ChatController,
    pub state_rx: watch::Receiver<UiState>,
}

impl App {
    pub fn new(client: GeminiClient) -> Self {
        let controller = ChatController::new(Arc::new(client.clone()));
        let state_rx = controller.subscribe();

        Self {
            should_quit: false,
            input_mode: InputMode::Editing,

            input: String::new(),
            cursor: 0,

            response_scroll: 0,
            response_height: 0,
            total_response_lines: 0,
            follow_stream: true,
            response_area: None,

            animation_frame: 0,

            show_model_picker: false,
            available_models: Vec::new(),
            model_picker_state: ListState::default(),

            client,
            controller,
            state_rx,
        }
    }

    pub fn ui_state(&self) -> UiState {
        self.state_rx.borrow().clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state_rx.borrow().is_loading()
    }

    pub fn model(&self) -> &str {
        self.client.model()
    }

    /// Submit the current input. The controller refuses blank prompts and
    /// overlapping requests; the input is kept so nothing typed is lost when
    /// a submission is refused.
    pub fn submit_input(&mut self) {
        if self.controller.submit(&self.input) {
            self.input.clear();
            self.cursor = 0;
            self.response_scroll = 0;
            self.follow_stream = true;
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.is_loading() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    fn max_scroll(&self) -> u16 {
        self.total_response_lines.saturating_sub(self.response_height)
    }

    // Response scrolling. Manual movement unpins the view from the bottom.
    pub fn scroll_down(&mut self) {
        self.follow_stream = false;
        self.response_scroll = self.response_scroll.saturating_add(1).min(self.max_scroll());
    }

    pub fn scroll_up(&mut self) {
        self.follow_stream = false;
        self.response_scroll = self.response_scroll.saturating_sub(1);
    }

    pub fn scroll_half_page_down(&mut self) {
        self.follow_stream = false;
        let half_page = self.response_height / 2;
        self.response_scroll = (self.response_scroll + half_page).min(self.max_scroll());
    }

    pub fn scroll_half_page_up(&mut self) {
        self.follow_stream = false;
        let half_page = self.response_height / 2;
        self.response_scroll = self.response_scroll.saturating_sub(half_page);
    }

    pub fn scroll_to_top(&mut self) {
        self.follow_stream = false;
        self.response_scroll = 0;
    }

    pub fn scroll_to_bottom(&mut self) {
        self.follow_stream = true;
        self.response_scroll = self.max_scroll();
    }

    // Model picker methods
    pub fn open_model_picker(&mut self, models: Vec<String>) {
        if models.is_empty() {
            return;
        }
        let current_idx = models
            .iter()
            .position(|m| m.as_str() == self.model())
            .unwrap_or(0);
        self.available_models = models;
        self.model_picker_state.select(Some(current_idx));
        self.show_model_picker = true;
    }

    pub fn model_picker_nav_down(&mut self) {
        let len = self.available_models.len();
        if len > 0 {
            let i = self.model_picker_state.selected().unwrap_or(0);
            self.model_picker_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn model_picker_nav_up(&mut self) {
        let i = self.model_picker_state.selected().unwrap_or(0);
        self.model_picker_state.select(Some(i.saturating_sub(1)));
    }

    /// Switch to the highlighted model. The client is rebuilt and a fresh
    /// controller starts a new session for it; refused while a request is
    /// in flight.
    pub fn select_model(&mut self) {
        if self.is_loading() {
            return;
        }
        if let Some(i) = self.model_picker_state.selected() {
            if let Some(model) = self.available_models.get(i).cloned() {
                self.client = self.client.with_model(&model);
                self.controller = ChatController::new(Arc::new(self.client.clone()));
                self.state_rx = self.controller.subscribe();
                self.response_scroll = 0;
                self.show_model_picker = false;
                // Save to config
                let _ = Config::save_model(&model);
            }
        }
    }
}
