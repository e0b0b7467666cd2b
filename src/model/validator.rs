use validator::ValidationError;

const MAX_TAGS: usize = 32;
const MAX_TAG_LEN: usize = 64;

/// Slugs are non-empty lower-case ASCII alphanumerics separated by single dashes.
pub fn validate_slug(slug: &str) -> Result<(), ValidationError> {
    let well_formed = !slug.is_empty()
        && slug.len() <= 255
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && !slug.contains("--")
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');

    if well_formed {
        Ok(())
    } else {
        let mut error = ValidationError::new("invalid_slug");
        error.message = Some("must be lower-case letters, digits and single dashes".into());
        Err(error)
    }
}

pub fn validate_tags(tags: &[String]) -> Result<(), ValidationError> {
    if tags.len() > MAX_TAGS {
        let mut error = ValidationError::new("too_many_tags");
        error.message = Some(format!("at most {MAX_TAGS} tags are allowed").into());
        return Err(error);
    }

    if tags
        .iter()
        .any(|tag| tag.trim().is_empty() || tag.chars().count() > MAX_TAG_LEN)
    {
        let mut error = ValidationError::new("invalid_tag");
        error.message = Some(format!("tags must be 1 to {MAX_TAG_LEN} characters").into());
        return Err(error);
    }

    Ok(())
}

/// Validates a password's length only; hashing happens in the password service.
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.chars().count() >= 6 {
        Ok(())
    } else {
        let mut error = ValidationError::new("password_too_short");
        error.message = Some("must not be less than 6 characters".into());
        Err(error)
    }
}
