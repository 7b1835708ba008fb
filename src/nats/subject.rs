use crate::error::{PipelineError, PipelineResult};

/// Subject carrying one device's demodulated FM audio:
/// `<namespace>.data.fm.<device>`
pub fn stream_subject(namespace: &str, device: &str) -> PipelineResult<String> {
    if !is_valid_token(device) {
        return Err(PipelineError::InvalidSubject(device.to_string()));
    }
    if namespace.is_empty() || !namespace.split('.').all(is_valid_token) {
        return Err(PipelineError::InvalidSubject(device.to_string()));
    }

    Ok(format!("{}.data.fm.{}", namespace, device))
}

/// A single subject token: non-empty, no separators, wildcards or whitespace
fn is_valid_token(token: &str) -> bool {
    !token.is_empty()
        && !token
            .chars()
            .any(|c| c == '.' || c == '*' || c == '>' || c.is_whitespace())
}

/// Whether a stream subject filter (which may hold `*` and `>` wildcards)
/// matches a concrete subject
pub fn subject_matches(filter: &str, subject: &str) -> bool {
    let mut filter_tokens = filter.split('.');
    let mut subject_tokens = subject.split('.');

    loop {
        match (filter_tokens.next(), subject_tokens.next()) {
            (Some(">"), Some(_)) => return true,
            (Some("*"), Some(_)) => {}
            (Some(f), Some(s)) if f == s => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

/// Name of the first stream whose subject filters cover `subject`
pub fn stream_for_subject<'a, I, S>(streams: I, subject: &str) -> Option<&'a str>
where
    I: IntoIterator<Item = (&'a str, &'a [S])>,
    S: AsRef<str> + 'a,
{
    streams
        .into_iter()
        .find(|(_, filters)| filters.iter().any(|f| subject_matches(f.as_ref(), subject)))
        .map(|(name, _)| name)
}
