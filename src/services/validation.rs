use std::collections::BTreeSet;

use validator::ValidationError;

pub const MAX_TAGS: usize = 20;
pub const MAX_TAG_LEN: usize = 50;

pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("must not be blank".into());
        return Err(err);
    }
    Ok(())
}

pub fn valid_tags(tags: &[String]) -> Result<(), ValidationError> {
    if tags.len() > MAX_TAGS {
        let mut err = ValidationError::new("too_many_tags");
        err.message = Some(format!("at most {MAX_TAGS} tags are allowed").into());
        return Err(err);
    }
    if tags.iter().any(|tag| tag.trim().chars().count() > MAX_TAG_LEN) {
        let mut err = ValidationError::new("tag_too_long");
        err.message = Some(format!("tags must be at most {MAX_TAG_LEN} characters").into());
        return Err(err);
    }
    Ok(())
}

/// Trimmed, lowercased, de-duplicated and sorted; blank tags are dropped.
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .map(|tag| tag.as_ref().trim().to_lowercase())
        .filter(|tag| !tag.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
