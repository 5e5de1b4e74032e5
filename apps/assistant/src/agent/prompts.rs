// All model prompt constants for the search agents.
// Reuses cross-cutting fragments from llm_client::prompts.

/// Intent classification: JSON verdict only.
pub const INTENT_SYSTEM: &str = "You route messages on a job-matching platform. \
    Decide whether a message is a concrete request to search for {records}. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object.";

/// Replace `{records}`, `{role_hint}`, `{active}`, `{last_intent}`, `{history}`, `{message}`.
pub const INTENT_PROMPT_TEMPLATE: &str = r#"A user on the platform wrote a message. Decide if the {records} search assistant should answer it.

The {records} search assistant serves {role_hint}.

Rules:
- "should_handle": true only if the user wants to browse or search {records}.
- "has_specific_criteria": true only if the request names at least one concrete criterion
  (a role, skill, location, employment type or category). "I want to hire someone" or
  "show me something" are NOT specific.
- "is_follow_up": true if the message only continues the previous search
  (e.g. "show more", "any others?", "next").

Session state: active search = {active}, previous turn was a search = {last_intent}

Recent conversation:
{history}

Message: {message}

Return EXACTLY this JSON shape:
{"should_handle": false, "has_specific_criteria": false, "is_follow_up": false}"#;

/// Filter extraction: JSON filter only.
pub const EXTRACTION_SYSTEM: &str = "You extract structured search filters from chat messages. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences.";

/// Replace `{records}`, `{categories}`, `{history}`, `{message}`.
pub const EXTRACTION_PROMPT_TEMPLATE: &str = r#"Extract search filters for {records} from the latest message.

Known categories (use one of these names exactly, or null):
{categories}

Recent conversation:
{history}

Latest message: {message}

Return EXACTLY this JSON shape, using null for anything not stated:
{
  "role": "job title or skill, e.g. driver",
  "location": "city, district or province",
  "employment_type": "full-time | part-time | contract | internship | null",
  "category_name": "one of the known categories or null",
  "max_results": null,
  "is_request_for_more": false
}

"is_request_for_more" is true only when the user asks for more results of the previous search."#;

/// Narrative summary of a search outcome.
pub const COMPOSE_SYSTEM: &str = "You write one short, warm chat reply (at most three sentences) \
    summarizing search results that are displayed to the user as cards.";

/// Replace `{persona}`, `{no_invention}`, `{brief}`.
pub const COMPOSE_PROMPT_TEMPLATE: &str = r#"{persona}

{no_invention}

Summarize this search outcome for the user. Mention how many results are shown and,
if more are available, that they can ask to see more. If nothing was found, suggest
broadening the search.

Brief (JSON):
{brief}"#;
