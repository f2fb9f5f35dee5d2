//! Message aggregation: raw source messages to canonical turns
//!
//! Aggregation is a two-state machine. `Empty` waits for the first
//! content-bearing message; `Collecting(role, acc)` merges same-role messages
//! and flushes a turn whenever the role changes. Noise never reaches the
//! accumulator and never flushes it.

use std::collections::BTreeSet;

use crate::model::{CodeEdit, Role, Turn};

/// Why a message is dropped before aggregation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Noise {
    /// System, meta, summary and other non-chat records
    NotConversational,
    /// Slash-command echo (`<command-name>...`)
    CommandEcho,
    /// Assistant reply to a command echo
    CommandReply,
    /// "Create a Task with subagent_type" trigger
    SubagentTrigger,
    /// Prompt handed to a subagent right after a trigger
    SubagentPrompt,
    /// Single-word housekeeping commands (warmup, usage, ...)
    BareCommand,
    ApiError,
    Synthetic,
    /// User message that only carries tool results
    ToolResultOnly,
}

/// One source-native message, already decoded by a reader
#[derive(Debug, Clone, PartialEq)]
pub struct RawMessage {
    pub role: Role,
    pub text: String,
    pub tools: Vec<String>,
    pub files: Vec<String>,
    pub thinking: String,
    pub thinking_ms: Option<i64>,
    pub timestamp_ms: Option<i64>,
    pub model_id: Option<String>,
    pub request_id: Option<String>,
    pub code_edits: Vec<CodeEdit>,
    pub source_response_ms: Option<i64>,
    pub noise: Option<Noise>,
}

impl RawMessage {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            text: String::new(),
            tools: Vec::new(),
            files: Vec::new(),
            thinking: String::new(),
            thinking_ms: None,
            timestamp_ms: None,
            model_id: None,
            request_id: None,
            code_edits: Vec::new(),
            source_response_ms: None,
            noise: None,
        }
    }

    pub fn user(text: &str) -> Self {
        Self::new(Role::User).with_text(text)
    }

    pub fn assistant(text: &str) -> Self {
        Self::new(Role::Assistant).with_text(text)
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn at(mut self, timestamp_ms: i64) -> Self {
        self.timestamp_ms = Some(timestamp_ms);
        self
    }

    pub fn noise(mut self, noise: Noise) -> Self {
        self.noise = Some(noise);
        self
    }

    fn has_body(&self) -> bool {
        !self.text.trim().is_empty() || !self.tools.is_empty() || !self.code_edits.is_empty()
    }

    fn is_thinking_only(&self) -> bool {
        !self.has_body() && !self.thinking.trim().is_empty()
    }
}

/// How merged messages combine for a given source
#[derive(Debug, Clone, Copy)]
pub struct MergePolicy {
    pub text_separator: &'static str,
    /// Keep the latest assistant timestamp instead of the earliest
    pub latest_assistant_timestamp: bool,
}

impl Default for MergePolicy {
    fn default() -> Self {
        Self {
            text_separator: "\n\n",
            latest_assistant_timestamp: false,
        }
    }
}

/// Turn content collected while one role keeps speaking
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Accumulator {
    texts: Vec<String>,
    tools: BTreeSet<String>,
    files: BTreeSet<String>,
    thinking: Vec<String>,
    thinking_ms: Option<i64>,
    timestamp_ms: Option<i64>,
    model_id: Option<String>,
    request_ids: Vec<String>,
    code_edits: Vec<CodeEdit>,
    source_response_ms: Option<i64>,
}

impl Accumulator {
    fn absorb(&mut self, msg: RawMessage, role: Role, policy: &MergePolicy) {
        if !msg.text.trim().is_empty() {
            self.texts.push(msg.text);
        }
        self.tools.extend(msg.tools.into_iter().filter(|t| !t.is_empty()));
        self.files.extend(msg.files.into_iter().filter(|f| !f.is_empty()));
        if !msg.thinking.trim().is_empty() {
            self.thinking.push(msg.thinking);
        }
        if let Some(ms) = msg.thinking_ms {
            *self.thinking_ms.get_or_insert(0) += ms;
        }
        self.timestamp_ms = match (self.timestamp_ms, msg.timestamp_ms) {
            (None, ts) => ts,
            (Some(cur), None) => Some(cur),
            (Some(cur), Some(new)) if role == Role::Assistant && policy.latest_assistant_timestamp => {
                Some(cur.max(new))
            }
            (Some(cur), Some(new)) => Some(cur.min(new)),
        };
        if self.model_id.is_none() {
            self.model_id = msg.model_id.filter(|m| !m.is_empty());
        }
        if let Some(id) = msg.request_id.filter(|id| !id.is_empty()) {
            if !self.request_ids.contains(&id) {
                self.request_ids.push(id);
            }
        }
        self.code_edits.extend(msg.code_edits);
        if self.source_response_ms.is_none() {
            self.source_response_ms = msg.source_response_ms;
        }
    }

    fn has_text_or_tools(&self) -> bool {
        !self.texts.is_empty() || !self.tools.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum State {
    Empty,
    Collecting(Role, Accumulator),
}

impl State {
    /// Feed one message; returns the next state and a completed turn, if any
    pub fn step(self, msg: RawMessage, policy: &MergePolicy) -> (State, Option<(Role, Accumulator)>) {
        if msg.noise.is_some() {
            return (self, None);
        }

        // Thinking alone never closes an assistant turn
        let role = if msg.is_thinking_only() {
            Role::Assistant
        } else if msg.has_body() {
            msg.role
        } else {
            return (self, None);
        };

        match self {
            State::Collecting(current, mut acc) if current == role => {
                acc.absorb(msg, role, policy);
                (State::Collecting(current, acc), None)
            }
            State::Collecting(current, acc) => {
                let mut fresh = Accumulator::default();
                fresh.absorb(msg, role, policy);
                (State::Collecting(role, fresh), Some((current, acc)))
            }
            State::Empty => {
                let mut fresh = Accumulator::default();
                fresh.absorb(msg, role, policy);
                (State::Collecting(role, fresh), None)
            }
        }
    }

    pub fn finish(self) -> Option<(Role, Accumulator)> {
        match self {
            State::Empty => None,
            State::Collecting(role, acc) => Some((role, acc)),
        }
    }
}

/// Session identity stamped onto every turn
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionInfo {
    pub session_id: String,
    pub session_name: String,
    pub workspace_id: String,
    pub workspace_name: String,
    pub workspace_folder: String,
    pub agent: String,
}

/// Run a session's messages through the state machine and apply the post-pass:
/// turns without text or tools are dropped, as are assistant turns before the
/// first user turn. Indices are assigned contiguously from 0.
pub fn aggregate(
    messages: impl IntoIterator<Item = RawMessage>,
    policy: &MergePolicy,
    info: &SessionInfo,
) -> Vec<Turn> {
    let mut state = State::Empty;
    let mut flushed = Vec::new();
    for msg in messages {
        let (next, done) = state.step(msg, policy);
        state = next;
        flushed.extend(done);
    }
    flushed.extend(state.finish());

    flushed
        .into_iter()
        .filter(|(_, acc)| acc.has_text_or_tools())
        .skip_while(|(role, _)| *role == Role::Assistant)
        .enumerate()
        .map(|(index, (role, acc))| build_turn(index as u32, role, acc, policy, info))
        .collect()
}

/// One turn per message, in order. Nothing is merged, filtered or dropped, so
/// the caller's message positions are the turn indices.
pub fn turns_in_order(
    messages: impl IntoIterator<Item = RawMessage>,
    policy: &MergePolicy,
    info: &SessionInfo,
) -> Vec<Turn> {
    messages
        .into_iter()
        .enumerate()
        .map(|(index, msg)| {
            let role = msg.role;
            let mut acc = Accumulator::default();
            acc.absorb(msg, role, policy);
            build_turn(index as u32, role, acc, policy, info)
        })
        .collect()
}

fn build_turn(index: u32, role: Role, acc: Accumulator, policy: &MergePolicy, info: &SessionInfo) -> Turn {
    let merged_request_ids = if acc.request_ids.len() > 1 {
        acc.request_ids.clone()
    } else {
        Vec::new()
    };
    Turn {
        session_id: info.session_id.clone(),
        turn: index,
        role,
        original_text: acc.texts.join(policy.text_separator),
        timestamp_ms: acc.timestamp_ms,
        workspace_id: info.workspace_id.clone(),
        workspace_name: info.workspace_name.clone(),
        workspace_folder: info.workspace_folder.clone(),
        session_name: info.session_name.clone(),
        agent: info.agent.clone(),
        files: acc.files.into_iter().collect(),
        tools: acc.tools.into_iter().collect(),
        code_edits: acc.code_edits,
        thinking_text: acc.thinking.join("\n\n"),
        thinking_duration_ms: acc.thinking_ms,
        model_id: acc.model_id,
        request_id: acc.request_ids.into_iter().next(),
        merged_request_ids,
        source_response_ms: acc.source_response_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> SessionInfo {
        SessionInfo {
            session_id: "s1".into(),
            agent: "test".into(),
            ..Default::default()
        }
    }

    fn run(messages: Vec<RawMessage>) -> Vec<Turn> {
        aggregate(messages, &MergePolicy::default(), &info())
    }

    #[test]
    fn test_turns_in_order_keeps_empty_messages() {
        let mut empty = RawMessage::assistant("");
        empty.request_id = Some("req-1".into());
        let turns = turns_in_order(
            vec![RawMessage::user("refactor"), empty, RawMessage::user("again"), RawMessage::assistant("ok")],
            &MergePolicy::default(),
            &info(),
        );
        let shape: Vec<_> = turns.iter().map(|t| (t.turn, t.role, t.original_text.as_str())).collect();
        assert_eq!(
            shape,
            vec![
                (0, Role::User, "refactor"),
                (1, Role::Assistant, ""),
                (2, Role::User, "again"),
                (3, Role::Assistant, "ok")
            ]
        );
        assert_eq!(turns[1].request_id.as_deref(), Some("req-1"));
    }

    #[test]
    fn test_orphan_assistant_dropped() {
        let turns = run(vec![
            RawMessage::assistant("orphan"),
            RawMessage::user("hi"),
            RawMessage::assistant("hello"),
        ]);
        let shape: Vec<_> = turns
            .iter()
            .map(|t| (t.turn, t.role, t.original_text.as_str()))
            .collect();
        assert_eq!(
            shape,
            vec![(0, Role::User, "hi"), (1, Role::Assistant, "hello")]
        );
    }

    #[test]
    fn test_same_role_merges_and_keeps_earliest_timestamp() {
        let turns = run(vec![
            RawMessage::user("first").at(2_000),
            RawMessage::user("second").at(1_000),
            RawMessage::assistant("reply").at(3_000),
        ]);
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].original_text, "first\n\nsecond");
        assert_eq!(turns[0].timestamp_ms, Some(1_000));
    }

    #[test]
    fn test_noise_neither_counts_nor_flushes() {
        let turns = run(vec![
            RawMessage::user("question"),
            RawMessage::assistant("part one"),
            RawMessage::user("").noise(Noise::ToolResultOnly),
            RawMessage::assistant("part two"),
            RawMessage::user("/status").noise(Noise::BareCommand),
        ]);
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[1].original_text, "part one\n\npart two");
    }

    #[test]
    fn test_thinking_only_merges_into_assistant() {
        let mut thought = RawMessage::new(Role::Assistant);
        thought.thinking = "pondering".into();
        thought.thinking_ms = Some(40);
        let mut more = RawMessage::new(Role::Assistant);
        more.thinking = "more".into();
        more.thinking_ms = Some(2);

        let turns = run(vec![
            RawMessage::user("q"),
            RawMessage::assistant("answer"),
            thought,
            more,
        ]);
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[1].thinking_text, "pondering\n\nmore");
        assert_eq!(turns[1].thinking_duration_ms, Some(42));
    }

    #[test]
    fn test_tool_only_turn_survives_empty_turn_dropped() {
        let mut tool = RawMessage::new(Role::Assistant);
        tool.tools = vec!["Read".into(), "Bash".into(), "Read".into()];
        let mut lonely_thought = RawMessage::new(Role::Assistant);
        lonely_thought.thinking = "hmm".into();

        let turns = run(vec![
            RawMessage::user("q"),
            tool,
            RawMessage::user("again"),
            lonely_thought,
        ]);
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[1].tools, vec!["Bash", "Read"]);
        assert_eq!(turns[2].role, Role::User);
    }

    #[test]
    fn test_request_ids_first_wins_and_merge_list() {
        let mut a = RawMessage::assistant("a");
        a.request_id = Some("r1".into());
        a.model_id = Some("m1".into());
        let mut b = RawMessage::assistant("b");
        b.request_id = Some("r2".into());
        b.model_id = Some("m2".into());

        let turns = run(vec![RawMessage::user("q"), a, b]);
        assert_eq!(turns[1].request_id.as_deref(), Some("r1"));
        assert_eq!(turns[1].model_id.as_deref(), Some("m1"));
        assert_eq!(turns[1].merged_request_ids, vec!["r1", "r2"]);
    }

    #[test]
    fn test_latest_assistant_timestamp_policy() {
        let policy = MergePolicy {
            text_separator: "\n\n_ ",
            latest_assistant_timestamp: true,
        };
        let turns = aggregate(
            vec![
                RawMessage::user("q").at(10),
                RawMessage::assistant("a").at(20),
                RawMessage::assistant("b").at(30),
            ],
            &policy,
            &info(),
        );
        assert_eq!(turns[1].timestamp_ms, Some(30));
        assert_eq!(turns[1].original_text, "a\n\n_ b");
    }

    #[test]
    fn test_step_is_pure_per_transition() {
        let policy = MergePolicy::default();
        let (state, done) = State::Empty.step(RawMessage::user("x"), &policy);
        assert!(done.is_none());
        let (state, done) = state.step(RawMessage::assistant("y"), &policy);
        assert_eq!(done.map(|(role, _)| role), Some(Role::User));
        assert!(matches!(state, State::Collecting(Role::Assistant, _)));
    }
}
