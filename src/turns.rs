//! Client-side turn state, folded from the event stream.
//!
//! The log owns every turn of a conversation and is only ever mutated by
//! applying stream events from its single thread of control. Routing is
//! by turn identifier, so late events from an abandoned run can never
//! corrupt a newer turn.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::pipeline::events::{FollowUpSet, StreamEvent};
use crate::tools::search::{ImageResult, SourceReference, VideoResult};

/// One user query and everything derived from it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Turn {
    pub id: u64,
    pub query: String,
    pub answer: String,
    pub streaming: bool,
    pub sources: Vec<SourceReference>,
    pub images: Vec<ImageResult>,
    pub videos: Vec<VideoResult>,
    pub follow_ups: Option<FollowUpSet>,
    pub started_at: DateTime<Utc>,
    /// Last applied answer fragment, kept for duplicate suppression.
    #[serde(skip)]
    last_fragment: Option<String>,
}

impl Turn {
    fn new(id: u64, query: String) -> Self {
        Self {
            id,
            query,
            answer: String::new(),
            streaming: true,
            sources: Vec::new(),
            images: Vec::new(),
            videos: Vec::new(),
            follow_ups: None,
            started_at: Utc::now(),
            last_fragment: None,
        }
    }
}

/// Ordered, append-only log of turns. Never evicts.
#[derive(Debug, Default)]
pub struct TurnLog {
    turns: Vec<Turn>,
}

impl TurnLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a new streaming turn. At most one turn streams at a time:
    /// any previous turn is closed first.
    pub fn begin_turn(&mut self, id: u64, query: impl Into<String>) {
        for turn in &mut self.turns {
            turn.streaming = false;
        }
        self.turns.push(Turn::new(id, query.into()));
    }

    /// Applies one event to the identified turn.
    ///
    /// An unknown identifier is a no-op. Answer fragments append; every
    /// other payload replaces its list wholesale. A fragment equal to the
    /// immediately preceding applied fragment is treated as a provider
    /// retransmission and dropped (there is no provider-native sequence
    /// marker to key on, so two legitimately identical consecutive
    /// fragments are indistinguishable from a retransmission).
    pub fn apply(&mut self, turn_id: u64, event: &StreamEvent) {
        let Some(turn) = self.turns.iter_mut().find(|turn| turn.id == turn_id) else {
            return;
        };

        match event {
            StreamEvent::SearchResults(sources) => {
                turn.sources = sources.clone();
            }
            StreamEvent::Images(images) => {
                turn.images = images.clone();
            }
            StreamEvent::Videos(videos) => {
                turn.videos = videos.clone();
            }
            StreamEvent::LlmResponse(fragment) => {
                if !turn.streaming || fragment.is_empty() {
                    return;
                }
                if turn.last_fragment.as_deref() == Some(fragment.as_str()) {
                    return;
                }
                turn.answer.push_str(fragment);
                turn.last_fragment = Some(fragment.clone());
            }
            StreamEvent::LlmResponseEnd(_) => {
                turn.streaming = false;
            }
            StreamEvent::FollowUp(set) => {
                turn.follow_ups = Some(set.clone());
            }
            StreamEvent::Done(_) => {}
        }
    }

    /// Marks a turn as no longer streaming after a failed run.
    pub fn fail(&mut self, turn_id: u64) {
        if let Some(turn) = self.turns.iter_mut().find(|turn| turn.id == turn_id) {
            turn.streaming = false;
        }
    }

    pub fn get(&self, turn_id: u64) -> Option<&Turn> {
        self.turns.iter().find(|turn| turn.id == turn_id)
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::events::DoneStatus;

    fn fragment(text: &str) -> StreamEvent {
        StreamEvent::LlmResponse(text.to_string())
    }

    fn source(title: &str) -> SourceReference {
        SourceReference {
            title: title.to_string(),
            link: format!("https://example.com/{}", title),
            favicon: String::new(),
        }
    }

    #[test]
    fn answer_is_the_concatenation_of_fragments_in_order() {
        let mut log = TurnLog::new();
        log.begin_turn(1, "q");

        log.apply(1, &fragment("Rust "));
        log.apply(1, &fragment("is "));
        log.apply(1, &fragment("fast."));

        assert_eq!(log.get(1).unwrap().answer, "Rust is fast.");
    }

    #[test]
    fn consecutive_duplicate_fragments_are_dropped() {
        let mut log = TurnLog::new();
        log.begin_turn(1, "q");

        log.apply(1, &fragment("token"));
        log.apply(1, &fragment("token"));
        log.apply(1, &fragment("next"));

        assert_eq!(log.get(1).unwrap().answer, "tokennext");
    }

    #[test]
    fn replaying_a_complete_sequence_is_idempotent() {
        let events = vec![
            StreamEvent::SearchResults(vec![source("a")]),
            fragment("Hello "),
            fragment("world"),
            StreamEvent::LlmResponseEnd(true),
            StreamEvent::Done(DoneStatus::Complete),
        ];

        let mut once = TurnLog::new();
        once.begin_turn(1, "q");
        for event in &events {
            once.apply(1, event);
        }

        let mut twice = TurnLog::new();
        twice.begin_turn(1, "q");
        for event in events.iter().chain(events.iter()) {
            twice.apply(1, event);
        }

        assert_eq!(once.get(1).unwrap().answer, twice.get(1).unwrap().answer);
        assert_eq!(once.get(1).unwrap().sources, twice.get(1).unwrap().sources);
    }

    #[test]
    fn unknown_turn_id_is_a_no_op() {
        let mut log = TurnLog::new();
        log.begin_turn(1, "q");

        log.apply(99, &fragment("lost"));

        assert_eq!(log.get(1).unwrap().answer, "");
        assert!(log.get(99).is_none());
    }

    #[test]
    fn answer_end_closes_the_stream() {
        let mut log = TurnLog::new();
        log.begin_turn(1, "q");
        assert!(log.get(1).unwrap().streaming);

        log.apply(1, &StreamEvent::LlmResponseEnd(true));
        assert!(!log.get(1).unwrap().streaming);

        // fragments after the end are late arrivals and are ignored
        log.apply(1, &fragment("late"));
        assert_eq!(log.get(1).unwrap().answer, "");
    }

    #[test]
    fn discovery_events_replace_wholesale() {
        let mut log = TurnLog::new();
        log.begin_turn(1, "q");

        log.apply(1, &StreamEvent::SearchResults(vec![source("a"), source("b")]));
        log.apply(1, &StreamEvent::SearchResults(vec![source("c")]));

        let turn = log.get(1).unwrap();
        assert_eq!(turn.sources.len(), 1);
        assert_eq!(turn.sources[0].title, "c");
    }

    #[test]
    fn only_the_newest_turn_streams() {
        let mut log = TurnLog::new();
        log.begin_turn(1, "first");
        log.begin_turn(2, "second");

        assert!(!log.get(1).unwrap().streaming);
        assert!(log.get(2).unwrap().streaming);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn follow_ups_attach_once() {
        let mut log = TurnLog::new();
        log.begin_turn(1, "q");

        let set = FollowUpSet {
            original: "q".to_string(),
            follow_up: vec!["a".to_string(), "b".to_string(), "c".to_string()],
        };
        log.apply(1, &StreamEvent::FollowUp(set.clone()));

        assert_eq!(log.get(1).unwrap().follow_ups.as_ref(), Some(&set));
    }
}
