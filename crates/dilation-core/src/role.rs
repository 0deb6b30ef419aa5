//! The asymmetric roles a Dilation peer plays during candidate selection.

/// Which side of the session this peer is.
///
/// The Leader arbitrates selection among simultaneously-negotiated
/// candidate connections; the Follower sends its KCM unprompted as soon as
/// its Noise handshake completes, while the Leader defers until it is
/// selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Chooses which candidate connection wins and tears down the rest.
    Leader,
    /// Sends its KCM immediately upon completing the Noise handshake.
    Follower,
}

impl Role {
    /// Whether this role sends its KCM immediately upon handshake
    /// completion, without waiting for selection.
    #[must_use]
    pub const fn sends_kcm_on_handshake(self) -> bool {
        matches!(self, Self::Follower)
    }
}
