// Shared prompt constants.
// Each feature that needs model calls defines its own prompts.rs alongside it.
// This file contains cross-cutting prompt fragments.

/// Who the assistant is, prepended to every conversational prompt.
pub const PLATFORM_PERSONA: &str = "You are the assistant of a job-matching platform that \
    connects job seekers with employers. You are friendly, concise and practical.";

/// Keeps narrative replies from inventing people, companies or listings.
pub const NO_INVENTION_INSTRUCTION: &str = "\
    CRITICAL: Only state facts given in the brief. Never invent names, companies, \
    salaries or listings. Do not use markdown headings or bullet lists.";

/// Fills `{name}` placeholders in one pass. Substituted text is never rescanned,
/// so user content containing `{message}` stays literal. Unknown placeholders
/// are left as written.
pub fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let value = after.find('}').and_then(|close| {
            let key = &after[..close];
            values
                .iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| (*value, close))
        });
        match value {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_template_substitutes_in_one_pass() {
        let filled = fill_template(
            "History:\n{history}\nLatest: {message}",
            &[("history", "User: what does {message} mean?"), ("message", "drivers")],
        );
        assert_eq!(filled, "History:\nUser: what does {message} mean?\nLatest: drivers");
    }

    #[test]
    fn test_fill_template_keeps_unknown_braces() {
        let filled = fill_template(r#"Return {"role": null} for {records}"#, &[("records", "jobs")]);
        assert_eq!(filled, r#"Return {"role": null} for jobs"#);
    }
}
