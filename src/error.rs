use thiserror::Error;

pub type Result<T> = std::result::Result<T, GameError>;

/// Revert strings the contract is known to emit. The facade matches on these
/// to classify failures the same way the game logic needs to react to them.
pub const REVERT_NOT_INITIALIZED: &str = "Khanate not initialized";
pub const REVERT_KHANATE_EXISTS: &str = "Khanate already exists";
pub const REVERT_STILL_TRAVELING: &str = "Troops still traveling";
pub const REVERT_ALREADY_RESOLVED: &str = "Battle already resolved";

const GENERIC_REMOTE_MESSAGE: &str =
    "chain call failed; the transaction may have reverted or the provider is unreachable";

#[derive(Debug, Error)]
pub enum GameError {
    /// A local precondition failed before any chain call was made.
    #[error("{0}")]
    Validation(String),

    /// The caller already has an unresolved battle in flight.
    #[error("you already have an active battle; wait for it to finish")]
    Conflict,

    /// Resolution was attempted before the on-chain deadline.
    #[error("troops still traveling; ready in {remaining_secs}s")]
    TooEarly { remaining_secs: u64 },

    /// The chain call reverted or the provider failed. `reason` carries the
    /// revert string when one could be extracted.
    #[error("{}", reason.as_deref().unwrap_or(GENERIC_REMOTE_MESSAGE))]
    Remote { reason: Option<String> },

    /// A referenced movement or correlated battle record does not exist.
    #[error("no matching movement or active battle")]
    NotFound,
}

impl GameError {
    pub fn validation(message: impl Into<String>) -> Self {
        GameError::Validation(message.into())
    }

    pub fn remote(reason: impl Into<String>) -> Self {
        GameError::Remote {
            reason: Some(reason.into()),
        }
    }

    pub fn remote_opaque() -> Self {
        GameError::Remote { reason: None }
    }

    fn reason_contains(&self, needle: &str) -> bool {
        match self {
            GameError::Remote {
                reason: Some(reason),
            } => reason.contains(needle),
            _ => false,
        }
    }

    /// The address has never created a Khanate. Callers route this into the
    /// creation flow rather than reporting it.
    pub fn is_not_initialized(&self) -> bool {
        self.reason_contains(REVERT_NOT_INITIALIZED)
    }

    pub fn is_khanate_exists(&self) -> bool {
        self.reason_contains(REVERT_KHANATE_EXISTS)
    }

    /// Someone else already executed the battle. Treated as a successful
    /// terminal state by the tracker, never surfaced to the user.
    pub fn is_already_resolved(&self) -> bool {
        self.reason_contains(REVERT_ALREADY_RESOLVED)
    }

    pub fn is_still_traveling(&self) -> bool {
        self.reason_contains(REVERT_STILL_TRAVELING)
    }
}

/// Pull a human-readable revert reason out of a raw provider error message.
///
/// Providers disagree on the shape: Ganache-style nodes wrap the reason in
/// `reason string "..."`, others append it after `execution reverted:`.
pub fn revert_reason(message: &str) -> Option<String> {
    if let Some(start) = message.find("reason string \"") {
        let rest = &message[start + "reason string \"".len()..];
        if let Some(end) = rest.find('"') {
            return Some(rest[..end].to_string());
        }
    }
    if let Some(start) = message.find("execution reverted: ") {
        let rest = &message[start + "execution reverted: ".len()..];
        let end = rest
            .find(", data:")
            .or_else(|| rest.find(['\n', '"', ')']))
            .unwrap_or(rest.len());
        let reason = rest[..end].trim().trim_end_matches(['.', ',']).to_string();
        if !reason.is_empty() {
            return Some(reason);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn revert_reason__extracts_reason_string_quotes() {
        // given
        let message =
            "VM Exception while processing transaction: revert, reason string \"Troops still traveling\" at step 3";

        // when
        let reason = revert_reason(message);

        // then
        assert_eq!(reason.as_deref(), Some("Troops still traveling"));
    }

    #[test]
    fn revert_reason__extracts_execution_reverted_suffix() {
        // given
        let message = "(code: 3, message: execution reverted: Battle already resolved, data: None)";

        // when
        let reason = revert_reason(message);

        // then
        assert_eq!(reason.as_deref(), Some("Battle already resolved"));
    }

    #[test]
    fn revert_reason__returns_none_when_unrecognized() {
        assert_eq!(revert_reason("connection refused"), None);
    }

    #[test]
    fn is_already_resolved__matches_classified_remote_errors_only() {
        // given
        let resolved = GameError::remote(REVERT_ALREADY_RESOLVED);
        let other = GameError::remote("out of gas");
        let opaque = GameError::remote_opaque();

        // then
        assert!(resolved.is_already_resolved());
        assert!(!other.is_already_resolved());
        assert!(!opaque.is_already_resolved());
        assert!(!GameError::NotFound.is_already_resolved());
    }

    #[test]
    fn display__remote_without_reason_uses_generic_message() {
        let err = GameError::remote_opaque();
        assert!(err.to_string().contains("chain call failed"));
    }
}
