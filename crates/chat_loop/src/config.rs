use std::time::Duration;

/// Configuration for the session loop.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Capacity of the event and update channels.
    pub channel_capacity: usize,
    /// Replaces the delay of `Pause` effects when set.
    pub pause_override: Option<Duration>,
    /// Write the settings snapshot after transitions that change it.
    pub save_settings: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 64,
            pause_override: None,
            save_settings: true,
        }
    }
}
