use crate::error::{FrameError, Result};
use crate::message::MessageKind;

/// Mapping between message kinds and their one-byte wire discriminants.
///
/// Built once at startup and then moved into a [`FrameCodec`], after which
/// it can no longer change.
///
/// [`FrameCodec`]: crate::codec::FrameCodec
#[derive(Debug, Clone)]
pub struct KindRegistry {
    by_discriminant: [Option<MessageKind>; 256],
    by_kind: [Option<u8>; MessageKind::COUNT],
}

impl KindRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            by_discriminant: [None; 256],
            by_kind: [None; MessageKind::COUNT],
        }
    }

    /// The discriminant table spoken by the control surface firmware.
    ///
    /// ```text
    /// 0 HandshakeRequest   4 UpdateVolume
    /// 1 Acknowledgment     5 SetDefaultEndpoint
    /// 2 AddItem            6 Settings
    /// 3 RemoveItem         7 Heartbeat
    /// ```
    pub fn standard() -> Self {
        let mut registry = Self::new();
        for kind in MessageKind::ALL {
            let discriminant = kind.index() as u8;
            registry.by_discriminant[discriminant as usize] = Some(kind);
            registry.by_kind[kind.index()] = Some(discriminant);
        }
        registry
    }

    /// Register `kind` under `discriminant`.
    ///
    /// Neither side may already be registered; existing entries are never
    /// overwritten.
    pub fn register(&mut self, kind: MessageKind, discriminant: u8) -> Result<()> {
        if let Some(existing) = self.by_discriminant[discriminant as usize] {
            return Err(FrameError::DuplicateDiscriminant {
                discriminant,
                existing,
            });
        }
        if let Some(discriminant) = self.by_kind[kind.index()] {
            return Err(FrameError::DuplicateKind { kind, discriminant });
        }

        self.by_discriminant[discriminant as usize] = Some(kind);
        self.by_kind[kind.index()] = Some(discriminant);
        Ok(())
    }

    /// The discriminant of `kind`, if registered.
    pub fn discriminant(&self, kind: MessageKind) -> Option<u8> {
        self.by_kind[kind.index()]
    }

    /// The kind registered under `discriminant`, if any.
    pub fn kind(&self, discriminant: u8) -> Option<MessageKind> {
        self.by_discriminant[discriminant as usize]
    }

    /// Number of registered kinds.
    pub fn len(&self) -> usize {
        self.by_kind.iter().filter(|entry| entry.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for KindRegistry {
    fn default() -> Self {
        Self::new()
    }
}
