use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};

const TOKEN_LENGTH: usize = 25;

/// Capability handed out in the confirmation link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionToken(String);

impl SubscriptionToken {
    pub fn generate() -> Self {
        let mut rng = thread_rng();
        let token = std::iter::repeat_with(|| rng.sample(Alphanumeric))
            .map(char::from)
            .take(TOKEN_LENGTH)
            .collect();

        Self(token)
    }

    pub fn parse(s: String) -> Result<SubscriptionToken, String> {
        let trimmed = s.trim();

        if trimmed.is_empty() {
            Err("Subscription token cannot be empty.".to_string())
        } else {
            Ok(Self(trimmed.to_string()))
        }
    }
}

impl AsRef<str> for SubscriptionToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
