use crate::event::{ChainRole, StreamEvent};

pub const CRITIC_MARKER: &str = "Critic:";
pub const RESPONDER_MARKER: &str = "Responder:";

/// Assigns an authoring role to chain-of-thought events.
///
/// A role announced by the frame itself wins. Otherwise the content is scanned for
/// role markers and the marker occurring earliest in the text decides. Content is never
/// modified.
#[derive(Debug, Clone)]
pub struct ReasoningClassifier {
    markers: Vec<(String, ChainRole)>,
}

impl Default for ReasoningClassifier {
    fn default() -> Self {
        Self::with_markers([
            (CRITIC_MARKER, ChainRole::Critic),
            (RESPONDER_MARKER, ChainRole::Responder),
        ])
    }
}

impl ReasoningClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_markers<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = (S, ChainRole)>,
        S: Into<String>,
    {
        Self {
            markers: markers
                .into_iter()
                .map(|(marker, role)| (Into::<String>::into(marker), role))
                .filter(|(marker, _)| !marker.is_empty())
                .collect(),
        }
    }

    pub fn classify(&self, event: StreamEvent) -> StreamEvent {
        match event {
            StreamEvent::Chain {
                declared_role,
                content,
                ..
            } => {
                let role = declared_role.unwrap_or_else(|| self.role_from_content(&content));
                StreamEvent::Chain {
                    role,
                    declared_role,
                    content,
                }
            }
            other => other,
        }
    }

    pub fn role_from_content(&self, content: &str) -> ChainRole {
        self.markers
            .iter()
            .filter_map(|(marker, role)| content.find(marker.as_str()).map(|at| (at, *role)))
            .min_by_key(|(at, _)| *at)
            .map(|(_, role)| role)
            .unwrap_or(ChainRole::Unknown)
    }
}
