use thoughtline_protocol::StreamEvent;

/// Near-bottom distance that still counts as "following the tail".
const AUTO_FOLLOW_THRESHOLD: f32 = 24.0;

/// Scroll metrics reported by the view.
///
/// `offset` grows downward from the top of the content; `max_offset` is the largest
/// reachable offset, so the viewport sits at the tail when the two are equal.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Viewport {
    pub offset: f32,
    pub max_offset: f32,
}

impl Viewport {
    pub fn new(offset: f32, max_offset: f32) -> Self {
        Self { offset, max_offset }
    }

    /// Viewport pinned to the bottom of its content.
    pub fn at_bottom(max_offset: f32) -> Self {
        Self::new(max_offset, max_offset)
    }

    pub fn is_near_bottom(&self) -> bool {
        if self.max_offset <= 0.0 {
            return true;
        }

        (self.max_offset - self.offset).abs() <= AUTO_FOLLOW_THRESHOLD
    }
}

/// Scroll policy of one exchange, snapshotted before the first byte arrives.
///
/// A user who scrolled up keeps their position for the whole exchange even if they later
/// return to the tail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoScroll {
    enabled: bool,
}

impl AutoScroll {
    pub fn capture(viewport: Viewport) -> Self {
        Self {
            enabled: viewport.is_near_bottom(),
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Only content-bearing events move the viewport.
    pub fn should_scroll(&self, event: &StreamEvent) -> bool {
        self.enabled && !matches!(event, StreamEvent::Malformed { .. })
    }
}
