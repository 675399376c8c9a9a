//! Publish/subscribe slots for capture render targets.
//!
//! The registry is owned by the renderer and handed by reference to whoever
//! needs it; there is no global state. Each [`Channel`] has a single writer
//! per frame (the depth capture that renders into it) and any number of
//! readers (particle fields). Readers re-fetch every frame and never hold on
//! to a published target across frames.

use std::fmt;

/// Identity of one render target allocation.
///
/// Reallocating a target (for example on resize) yields a new id, which is
/// how readers notice they must rebind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(pub u64);

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "target#{}", self.0)
    }
}

/// Registry slot. Four are available; shared capture only uses `Depth`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Primary depth channel (the "r" slot).
    Depth,
    G,
    B,
    A,
}

impl Channel {
    /// All channels in slot order.
    pub const ALL: [Channel; 4] = [Channel::Depth, Channel::G, Channel::B, Channel::A];

    /// Slot index, 0..4.
    pub fn index(self) -> usize {
        match self {
            Channel::Depth => 0,
            Channel::G => 1,
            Channel::B => 2,
            Channel::A => 3,
        }
    }

    /// Channel for a slot index, if in range.
    pub fn from_index(index: usize) -> Option<Channel> {
        Self::ALL.get(index).copied()
    }
}

/// A target currently visible to readers.
#[derive(Debug, Clone)]
pub struct Published<T> {
    pub id: TargetId,
    pub target: T,
}

/// Four-slot registry of published render targets.
#[derive(Debug, Clone)]
pub struct RenderTargetRegistry<T> {
    slots: [Option<Published<T>>; 4],
}

impl<T> Default for RenderTargetRegistry<T> {
    fn default() -> Self {
        Self {
            slots: [None, None, None, None],
        }
    }
}

impl<T> RenderTargetRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `target` on `channel`.
    ///
    /// Returns `true` if readers see a different target than before.
    /// Publishing the same id again is a no-op.
    pub fn publish(&mut self, channel: Channel, id: TargetId, target: T) -> bool {
        let slot = &mut self.slots[channel.index()];
        if matches!(slot, Some(p) if p.id == id) {
            return false;
        }
        *slot = Some(Published { id, target });
        true
    }

    /// Remove whatever is published on `channel`.
    pub fn clear(&mut self, channel: Channel) -> Option<Published<T>> {
        self.slots[channel.index()].take()
    }

    /// Current target on `channel`, or `None` before the first capture.
    pub fn get(&self, channel: Channel) -> Option<&Published<T>> {
        self.slots[channel.index()].as_ref()
    }

    /// Id of the current target on `channel`.
    pub fn current_id(&self, channel: Channel) -> Option<TargetId> {
        self.get(channel).map(|p| p.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unpublished_is_none() {
        let registry: RenderTargetRegistry<&str> = RenderTargetRegistry::new();
        for channel in Channel::ALL {
            assert!(registry.get(channel).is_none());
        }
    }

    #[test]
    fn test_readers_see_published_target() {
        let mut registry = RenderTargetRegistry::new();
        assert!(registry.publish(Channel::Depth, TargetId(1), "capture"));

        // Same frame
        let seen = registry.get(Channel::Depth).expect("published");
        assert_eq!(seen.id, TargetId(1));
        assert_eq!(seen.target, "capture");

        // Later frames: the capture republishes, readers still see it
        for _ in 0..3 {
            assert!(!registry.publish(Channel::Depth, TargetId(1), "capture"));
            assert_eq!(registry.current_id(Channel::Depth), Some(TargetId(1)));
        }
    }

    #[test]
    fn test_new_id_replaces_target() {
        let mut registry = RenderTargetRegistry::new();
        registry.publish(Channel::Depth, TargetId(1), 800u32);
        assert!(registry.publish(Channel::Depth, TargetId(2), 1600u32));
        assert_eq!(registry.get(Channel::Depth).map(|p| p.target), Some(1600));
    }

    #[test]
    fn test_channels_are_independent() {
        let mut registry = RenderTargetRegistry::new();
        registry.publish(Channel::G, TargetId(5), 'g');
        assert!(registry.get(Channel::Depth).is_none());
        assert_eq!(registry.current_id(Channel::G), Some(TargetId(5)));

        assert!(registry.clear(Channel::G).is_some());
        assert!(registry.get(Channel::G).is_none());
    }

    #[test]
    fn test_channel_index_round_trip() {
        for (i, channel) in Channel::ALL.iter().enumerate() {
            assert_eq!(channel.index(), i);
            assert_eq!(Channel::from_index(i), Some(*channel));
        }
        assert_eq!(Channel::from_index(4), None);
    }
}
