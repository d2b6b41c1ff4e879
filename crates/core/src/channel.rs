/// What the conversation's channel can display. Queried per render.
pub trait ChannelCapabilities: Send + Sync {
    /// How many selectable actions (quick-reply buttons) one message may carry; zero when the
    /// channel has none.
    fn max_selectable_actions(&self) -> usize;
}

/// A channel with a fixed button capacity, e.g. `StaticCapabilities(0)` for a terminal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StaticCapabilities(pub usize);

impl ChannelCapabilities for StaticCapabilities {
    fn max_selectable_actions(&self) -> usize {
        self.0
    }
}
