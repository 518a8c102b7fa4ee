use std::borrow::Cow;

#[derive(Debug)]
pub enum Validity {
    Valid,
    Invalid(Cow<'static, str>),
}

impl Validity {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validity::Valid)
    }
}

pub const MAX_EMAIL_LENGTH: usize = 320;

pub fn validate_email_address(email: &str) -> Validity {
    if email.len() > MAX_EMAIL_LENGTH {
        return Validity::Invalid(Cow::Borrowed("Email address is too long."));
    }

    if email.chars().any(|c| c.is_whitespace() || !c.is_ascii()) {
        return Validity::Invalid(Cow::Borrowed(
            "Email address must be ASCII and cannot contain whitespace.",
        ));
    }

    let Some((username, domain)) = email.split_once('@') else {
        return Validity::Invalid(Cow::Borrowed(
            "Email address must contain an at symbol (@).",
        ));
    };

    if username.is_empty() || domain.len() < 3 {
        return Validity::Invalid(Cow::Borrowed("Email username or domain name is too short."));
    }

    if domain.contains('@') || !domain.contains('.') {
        return Validity::Invalid(Cow::Borrowed(
            "Email address must have only one at symbol (@) and the domain must contain a period.",
        ));
    }

    if domain.starts_with('.') || domain.ends_with('.') {
        return Validity::Invalid(Cow::Borrowed(
            "Domain name in email address cannot begin or end with a period.",
        ));
    }

    Validity::Valid
}
