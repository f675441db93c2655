use rand::{distributions::Alphanumeric, Rng};
use time::OffsetDateTime;

pub const SESSION_TOKEN_LEN: usize = 40;
pub const RESET_TOKEN_LEN: usize = 32;
pub const INVITATION_TOKEN_LEN: usize = 48;

/// Random alphanumeric token from the thread-local CSPRNG.
pub fn generate_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStatus {
    Valid,
    Used,
    Expired,
}

/// A reset token is good for exactly one confirm, strictly before expiry.
pub fn reset_token_status(
    is_used: bool,
    expires_at: OffsetDateTime,
    now: OffsetDateTime,
) -> TokenStatus {
    if is_used {
        TokenStatus::Used
    } else if now >= expires_at {
        TokenStatus::Expired
    } else {
        TokenStatus::Valid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    #[test]
    fn generated_tokens_are_alphanumeric_and_sized() {
        let token = generate_token(RESET_TOKEN_LEN);
        assert_eq!(token.len(), RESET_TOKEN_LEN);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn generated_tokens_differ() {
        assert_ne!(
            generate_token(SESSION_TOKEN_LEN),
            generate_token(SESSION_TOKEN_LEN)
        );
    }

    #[test]
    fn fresh_token_is_valid() {
        let now = OffsetDateTime::UNIX_EPOCH;
        let status = reset_token_status(false, now + Duration::hours(24), now);
        assert_eq!(status, TokenStatus::Valid);
    }

    #[test]
    fn used_token_is_rejected() {
        let now = OffsetDateTime::UNIX_EPOCH;
        let status = reset_token_status(true, now + Duration::hours(24), now);
        assert_eq!(status, TokenStatus::Used);
    }

    #[test]
    fn token_rejected_at_and_after_expiry() {
        let now = OffsetDateTime::UNIX_EPOCH;
        assert_eq!(reset_token_status(false, now, now), TokenStatus::Expired);
        assert_eq!(
            reset_token_status(false, now - Duration::seconds(1), now),
            TokenStatus::Expired
        );
        assert_eq!(
            reset_token_status(false, now + Duration::seconds(1), now),
            TokenStatus::Valid
        );
    }
}
