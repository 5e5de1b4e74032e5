//! Keyword tables used by the intent gate, the filter extractor and role matching.
//!
//! The tables are data; the single matching rule is `contains_phrase`, a
//! whole-word match on a normalized, lowercased message.

use crate::models::record::RecordKind;

/// Per-agent phrase tables.
#[derive(Debug)]
pub struct Vocabulary {
    pub kind: RecordKind,
    /// Unambiguous search requests for this agent's side of the marketplace.
    pub qualifying: &'static [&'static str],
    /// Language belonging to the other side of the marketplace.
    pub disqualifying: &'static [&'static str],
    /// Nouns naming this agent's records; drive `"<N> jobs"` counts and the safety net.
    pub record_nouns: &'static [&'static str],
}

pub static CANDIDATE_VOCABULARY: Vocabulary = Vocabulary {
    kind: RecordKind::Candidates,
    qualifying: &[
        "show me candidates",
        "find candidates",
        "find me candidates",
        "search candidates",
        "search for candidates",
        "list candidates",
        "show candidates",
        "looking for candidates",
        "candidates in",
        "candidates for",
        "candidates with",
        "find workers",
        "find me workers",
        "find employees",
        "talent search",
    ],
    disqualifying: &[
        "find me a job",
        "looking for a job",
        "looking for work",
        "i need a job",
        "i want a job",
        "job openings",
        "apply for",
        "my cv",
        "my resume",
        "vacancies",
    ],
    record_nouns: &[
        "candidate",
        "candidates",
        "people",
        "person",
        "persons",
        "worker",
        "workers",
        "employee",
        "employees",
        "applicant",
        "applicants",
        "profile",
        "profiles",
        "result",
        "results",
    ],
};

pub static JOB_VOCABULARY: Vocabulary = Vocabulary {
    kind: RecordKind::Jobs,
    qualifying: &[
        "show me jobs",
        "find jobs",
        "find me a job",
        "find me jobs",
        "search jobs",
        "search for jobs",
        "list jobs",
        "show jobs",
        "looking for a job",
        "looking for work",
        "job openings",
        "available jobs",
        "jobs in",
        "jobs for",
        "vacancies in",
    ],
    disqualifying: &[
        "hire",
        "hiring",
        "recruit",
        "recruiting",
        "find candidates",
        "looking for candidates",
        "show me candidates",
        "post a job",
        "find workers",
        "find employees",
    ],
    record_nouns: &[
        "job",
        "jobs",
        "vacancy",
        "vacancies",
        "opening",
        "openings",
        "position",
        "positions",
        "listing",
        "listings",
        "opportunity",
        "opportunities",
        "result",
        "results",
    ],
};

const SEARCH_VERBS: &[&str] = &["find", "search", "show", "list", "looking for", "get me"];

/// Explicit paging requests. A bare "more" or "next" only counts as the whole message.
const LOAD_MORE_PHRASES: &[&str] = &[
    "show more",
    "show me more",
    "see more",
    "load more",
    "more please",
    "next page",
    "next batch",
    "next ones",
];
const BARE_MORE_WORDS: &[&str] = &["more", "next"];

const SHOW_ALL_PHRASES: &[&str] = &[
    "show all",
    "see all",
    "list all",
    "all of them",
    "all remaining",
    "the rest",
    "everything",
];

/// Common role words mapped to broader terms seen in titles and descriptions.
pub const ROLE_SYNONYMS: &[(&str, &[&str])] = &[
    ("driver", &["driver", "driving", "chauffeur", "transport", "delivery", "logistics"]),
    ("nurse", &["nurse", "nursing", "caregiver", "midwife", "health"]),
    ("teacher", &["teacher", "teaching", "tutor", "educator", "instructor", "lecturer"]),
    ("developer", &["developer", "programmer", "software", "engineer", "coding"]),
    ("accountant", &["accountant", "accounting", "bookkeeper", "finance", "auditor"]),
    ("cleaner", &["cleaner", "cleaning", "housekeeper", "janitor", "housekeeping"]),
    ("cook", &["cook", "chef", "kitchen", "culinary", "catering"]),
    ("security", &["security", "guard", "watchman", "guarding"]),
    ("sales", &["sales", "salesperson", "marketing", "seller", "agent"]),
    ("mechanic", &["mechanic", "technician", "repair", "garage"]),
    ("electrician", &["electrician", "electrical", "wiring"]),
    ("receptionist", &["receptionist", "front desk", "secretary", "administrative"]),
    ("waiter", &["waiter", "waitress", "server", "hospitality", "restaurant"]),
    ("builder", &["builder", "construction", "mason", "carpenter", "plumber"]),
    ("farmer", &["farmer", "agriculture", "agronomist", "farming"]),
];

/// Largest page a single request may ask for.
pub const MAX_PAGE_SIZE: u32 = 50;

/// Lowercases and replaces punctuation with spaces, padded for whole-word search.
pub fn normalize(text: &str) -> String {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '\'' { c } else { ' ' })
        .collect();
    let joined = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    format!(" {joined} ")
}

/// Whole-word phrase match against an already `normalize`d message.
pub fn contains_phrase(normalized: &str, phrase: &str) -> bool {
    let phrase = normalize(phrase);
    !phrase.trim().is_empty() && normalized.contains(&phrase)
}

pub fn matches_any(message: &str, phrases: &[&str]) -> bool {
    let normalized = normalize(message);
    phrases.iter().any(|p| contains_phrase(&normalized, p))
}

pub fn asks_for_all(message: &str) -> bool {
    matches_any(message, SHOW_ALL_PHRASES)
}

impl Vocabulary {
    pub fn is_disqualified(&self, message: &str) -> bool {
        matches_any(message, self.disqualifying)
    }

    pub fn is_qualified(&self, message: &str) -> bool {
        matches_any(message, self.qualifying)
    }

    /// An explicit request for the next page: a paging phrase, `"more <records>"`,
    /// or a message that is nothing but "more" or "next".
    pub fn asks_for_next_page(&self, message: &str) -> bool {
        let normalized = normalize(message);
        if BARE_MORE_WORDS.iter().any(|w| normalized.trim() == *w) {
            return true;
        }
        LOAD_MORE_PHRASES.iter().any(|p| contains_phrase(&normalized, p))
            || self
                .record_nouns
                .iter()
                .any(|noun| contains_phrase(&normalized, &format!("more {noun}")))
    }

    /// Last-resort acceptance when the classifier fails: a search verb and one of
    /// this agent's plural record nouns in the same message.
    pub fn passes_safety_net(&self, message: &str) -> bool {
        let normalized = normalize(message);
        let has_verb = SEARCH_VERBS.iter().any(|v| contains_phrase(&normalized, v));
        let has_noun = self
            .record_nouns
            .iter()
            .filter(|n| n.ends_with('s') && **n != "results")
            .any(|n| contains_phrase(&normalized, n));
        has_verb && has_noun
    }

    /// A literal `"<N> <noun>"` request (up to one word between number and noun).
    pub fn requested_count(&self, message: &str) -> Option<u32> {
        let normalized = normalize(message);
        let tokens: Vec<&str> = normalized.split_whitespace().collect();
        tokens.iter().enumerate().find_map(|(i, token)| {
            let n = token.parse::<u32>().ok().filter(|n| *n > 0)?;
            tokens
                .iter()
                .skip(i + 1)
                .take(2)
                .any(|next| self.record_nouns.contains(next))
                .then_some(n)
        })
    }
}

/// Synonyms for every table key appearing as a word in `role`.
pub fn synonyms_for(role: &str) -> Vec<&'static str> {
    let normalized = normalize(role);
    ROLE_SYNONYMS
        .iter()
        .filter(|(key, _)| {
            contains_phrase(&normalized, key) || contains_phrase(&normalized, &format!("{key}s"))
        })
        .flat_map(|(_, synonyms)| synonyms.iter().copied())
        .collect()
}
