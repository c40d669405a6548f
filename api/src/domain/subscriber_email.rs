use validator::validate_email;

/// An email address in its normalized form: trimmed and lowercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriberEmail(String);

impl SubscriberEmail {
    pub fn parse(s: String) -> Result<SubscriberEmail, String> {
        let normalized = s.trim().to_lowercase();

        if validate_email(normalized.as_str()) && has_dotted_domain(&normalized) {
            Ok(Self(normalized))
        } else {
            Err(format!("{} is not a valid subscriber email.", s))
        }
    }
}

// local@domain.tld: one '@', no whitespace, and a dot inside the domain with
// something on both sides of it.
fn has_dotted_domain(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }

    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain
                    .rsplit_once('.')
                    .map_or(false, |(name, tld)| !name.is_empty() && !tld.is_empty())
        }
        None => false,
    }
}

impl AsRef<str> for SubscriberEmail {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SubscriberEmail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}
