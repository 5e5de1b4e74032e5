// Prompt constants for the conversational paths outside structured search.
// Reuses cross-cutting fragments from llm_client::prompts.

/// Generic platform chat when no search agent takes the message.
pub const GENERIC_CHAT_SYSTEM: &str = "You answer questions about a job-matching platform \
    in plain conversational text. Keep replies under 120 words.";

/// Replace `{persona}`, `{no_invention}`, `{history}`, `{message}`.
pub const GENERIC_CHAT_PROMPT_TEMPLATE: &str = r#"{persona}

{no_invention}

Recent conversation:
{history}

User: {message}

Reply to the user. If they seem to be looking for jobs or candidates, tell them they can
ask for a role, a location or an employment type."#;

/// Asks the user to narrow down a search that named no concrete criteria.
pub const CLARIFY_SYSTEM: &str = "You help users phrase search requests. \
    Reply with one or two short sentences and no lists.";

/// Replace `{persona}`, `{records}`, `{message}`.
pub const CLARIFY_PROMPT_TEMPLATE: &str = r#"{persona}

The user wants to search for {records} but gave no concrete criteria:
"{message}"

Ask them, warmly and briefly, which role or skill, which location, and which employment
type (full-time, part-time, contract, internship) they are interested in."#;

/// Conversation title from the first user message.
pub const TITLE_SYSTEM: &str = "You write short conversation titles. \
    Respond with the title only: at most six words, no quotes, no trailing punctuation.";

/// Replace `{message}`.
pub const TITLE_PROMPT_TEMPLATE: &str = r#"Write a title for a conversation that starts with:
"{message}""#;
