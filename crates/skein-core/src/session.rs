//! Conversation-level state wrapped around the per-turn assembler.

use tracing::{debug, info, warn};

use crate::stream::{
    DecodedLine, EventPayload, InitInfo, RateLimitInfo, ResponseMeta, StreamEvent, decode_line,
};
use crate::transcript::{Assembler, Role, Turn, extract_turn};

/// Cumulative and last-request accounting across a session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionStats {
    pub total_requests: u32,
    pub total_cost_usd: f64,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub last_model: Option<String>,
    pub last_cost_usd: f64,
    pub last_input_tokens: u64,
    pub last_output_tokens: u64,
    pub last_cache_read_tokens: u64,
    pub last_duration_ms: u64,
    pub last_api_duration_ms: u64,
}

impl SessionStats {
    /// Counts one completed response. Responses without a result are skipped.
    pub fn record(&mut self, meta: &ResponseMeta) {
        let Some(result) = &meta.result else {
            return;
        };
        self.total_requests += 1;
        self.total_cost_usd += result.total_cost_usd;
        self.total_input_tokens += result.usage.input_tokens;
        self.total_output_tokens += result.usage.output_tokens;
        self.last_model.clone_from(&meta.model);
        self.last_cost_usd = result.total_cost_usd;
        self.last_input_tokens = result.usage.input_tokens;
        self.last_output_tokens = result.usage.output_tokens;
        self.last_cache_read_tokens = result.usage.cache_read_input_tokens;
        self.last_duration_ms = result.duration_ms;
        self.last_api_duration_ms = result.duration_api_ms;
    }

    /// Share of the last request's input served from the prompt cache.
    pub fn cache_hit_percent(&self) -> Option<f64> {
        let total = self.last_input_tokens + self.last_cache_read_tokens;
        if total == 0 {
            return None;
        }
        Some(self.last_cache_read_tokens as f64 * 100.0 / total as f64)
    }
}

/// A completed run collected without streaming.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Response {
    pub events: Vec<StreamEvent>,
    pub meta: ResponseMeta,
}

impl Response {
    /// Decodes every line, keeping the events in order and folding their
    /// response metadata. Undecodable lines are skipped.
    pub fn from_lines<'a, I>(lines: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        Self::from_decoded(lines.into_iter().filter_map(decode_line))
    }

    /// Builds a response from lines that were already decoded.
    pub fn from_decoded<I>(lines: I) -> Self
    where
        I: IntoIterator<Item = DecodedLine>,
    {
        let mut response = Response::default();
        for decoded in lines {
            response.meta.merge(&decoded);
            response.events.push(decoded.event);
        }
        response
    }
}

#[derive(Debug, Clone, Default)]
pub struct Session {
    assembler: Assembler,
    turns: Vec<Turn>,
    session_id: Option<String>,
    init: Option<InitInfo>,
    rate_limit: Option<RateLimitInfo>,
    stats: SessionStats,
}

impl Session {
    pub fn new(assembler: Assembler) -> Self {
        Self {
            assembler,
            ..Self::default()
        }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Id of the last completed run, for resuming the conversation.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn init(&self) -> Option<&InitInfo> {
        self.init.as_ref()
    }

    pub fn rate_limit(&self) -> Option<&RateLimitInfo> {
        self.rate_limit.as_ref()
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn streaming_turn(&self) -> Option<&Turn> {
        self.turns.last().filter(|turn| turn.is_streaming())
    }

    pub fn push_user(&mut self, prompt: impl Into<String>) {
        self.turns.push(Turn::user(prompt));
    }

    /// Opens an empty assistant turn for the incoming stream.
    pub fn begin_response(&mut self) {
        if self.streaming_turn().is_some() {
            warn!("response started while another is still streaming");
            self.finish_response();
        }
        self.turns.push(Turn::assistant());
    }

    /// Applies one decoded line: session banners first, then the streaming
    /// turn's metadata and blocks.
    pub fn apply(&mut self, line: &DecodedLine) {
        self.observe_banner(&line.event);

        let Some(turn) = self.turns.last_mut().filter(|turn| turn.is_streaming()) else {
            debug!(kind = %line.event.kind(), "no streaming turn for event");
            return;
        };
        turn.merge_meta(line);
        self.assembler.route(turn, &line.event);
    }

    /// Finalizes the streaming turn and records its result.
    pub fn finish_response(&mut self) {
        let Some(turn) = self.turns.last_mut().filter(|turn| turn.is_streaming()) else {
            return;
        };
        self.assembler.finalize(turn);
        let meta = turn.meta().clone();
        self.record_meta(&meta);
    }

    /// Replaces the streaming turn with an error turn, or appends one when
    /// nothing is streaming.
    pub fn fail_response(&mut self, message: impl Into<String>) {
        let error = Turn::error(message);
        match self.turns.last_mut() {
            Some(turn) if turn.is_streaming() => *turn = error,
            _ => self.turns.push(error),
        }
    }

    /// Adds a finalized assistant turn built from a complete response.
    pub fn record_response(&mut self, response: &Response) {
        for event in &response.events {
            self.observe_banner(event);
        }
        let mut turn = extract_turn(&response.events, &self.assembler);
        turn.set_meta(response.meta.clone());
        self.record_meta(&response.meta);
        self.turns.push(turn);
    }

    fn observe_banner(&mut self, event: &StreamEvent) {
        match &event.payload {
            EventPayload::SystemInit(info) if self.init.is_none() => {
                info!(model = %info.model, version = %info.version, "session initialized");
                self.init = Some(info.clone());
            }
            EventPayload::RateLimit(info) => self.rate_limit = Some(info.clone()),
            _ => {}
        }
    }

    fn record_meta(&mut self, meta: &ResponseMeta) {
        if let Some(result) = &meta.result
            && !result.session_id.is_empty()
        {
            self.session_id = Some(result.session_id.clone());
        }
        self.stats.record(meta);
    }

    /// The last assistant turn, streaming or not.
    pub fn last_assistant(&self) -> Option<&Turn> {
        self.turns
            .iter()
            .rev()
            .find(|turn| turn.role() == Role::Assistant)
    }
}
