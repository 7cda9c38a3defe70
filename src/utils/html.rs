/// Clean free-text answers before they are stored.
///
/// Instructors render submitted answers in their grading view, so anything
/// a student types is treated as untrusted HTML: safe formatting tags (like
/// <b>, <p>) survive, scripts and event-handler attributes are stripped.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}
