//! One chat turn for a search variant, streamed as it progresses.
//!
//! The title call runs alongside gating and search, so the `title` and results
//! events go out before composition starts. Both turns are persisted before the
//! first text fragment, so the stored history never depends on how much of the
//! stream the client received.

use std::time::Duration;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::agent::intent::IntentDecision;
use crate::agent::{AgentDeps, AgentError, SearchAgent, SearchOutcome, SearchService};
use crate::chat::history::MessageLog;
use crate::chat::replies::{clarification_reply, generic_reply, session_title};
use crate::errors::AppError;
use crate::models::chat::{ChatMessage, ChatRole};
use crate::models::record::SearchRecord;
use crate::streaming::{Delivery, EventSink, ReplyStream, StreamEvent};

/// Messages loaded for gating, extraction and generic chat.
const HISTORY_WINDOW: i64 = 10;

#[derive(Debug, Clone, Copy)]
pub struct TurnInput<'a> {
    pub session_id: Uuid,
    pub message: &'a str,
    pub token: &'a str,
}

impl TurnInput<'_> {
    /// Checks run before any event may be written.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.message.trim().is_empty() {
            return Err(AppError::Validation("message is required".to_string()));
        }
        if self.token.trim().is_empty() {
            return Err(AppError::Unauthorized(
                "Authentication token is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// Where the gate sent this message.
enum Route<R> {
    Search(SearchOutcome<R>),
    Clarify,
    Decline,
}

/// Runs one turn against `sink`. A failure ends the stream with an `error` event.
pub async fn stream_turn<R: SearchRecord>(
    service: &SearchService<R>,
    log: &dyn MessageLog,
    input: TurnInput<'_>,
    sink: &mut dyn EventSink,
    word_delay: Duration,
) -> Delivery {
    let mut stream = ReplyStream::new(sink, word_delay);
    match run_turn(service, log, input, &mut stream).await {
        Ok(()) => stream.finish().await,
        Err(e) => {
            let (_, code, message) = e.parts();
            warn!("Session {}: turn failed with {code}", input.session_id);
            stream.fail(code, &message).await
        }
    }
}

async fn run_turn<R: SearchRecord>(
    service: &SearchService<R>,
    log: &dyn MessageLog,
    input: TurnInput<'_>,
    stream: &mut ReplyStream<'_>,
) -> Result<(), AppError> {
    input.validate()?;
    let message = input.message.trim();
    let session_id = input.session_id;
    let deps = service.deps();

    // Held for the whole turn so turns within one session never interleave.
    let agent = service.agent(session_id).await;
    let mut agent = agent.lock().await;

    log.ensure_session(session_id).await?;
    let history = log.recent(session_id, HISTORY_WINDOW).await?;
    let is_first_message = !history.iter().any(|m| m.is_user());

    let title = async {
        if is_first_message {
            Some(session_title(deps.llm.as_ref(), deps.timeouts.title, message).await)
        } else {
            None
        }
    };
    let (title, routed) = tokio::join!(
        title,
        route(deps, &mut agent, session_id, message, &history, input.token)
    );
    let routed = routed?;

    if let Some(title) = title {
        if let Err(e) = log.set_title(session_id, &title).await {
            warn!("Session {session_id}: could not store title: {e}");
        }
        stream.send(&StreamEvent::Title { title }).await;
    }

    let text = match routed {
        Route::Search(outcome) => {
            if !outcome.records.is_empty() {
                stream
                    .send(&StreamEvent::results(&outcome.records, outcome.total, outcome.has_more))
                    .await;
            }
            outcome.compose(deps).await
        }
        Route::Clarify => {
            clarification_reply(deps.llm.as_ref(), deps.timeouts.compose, R::KIND, message).await
        }
        Route::Decline => {
            generic_reply(deps.llm.as_ref(), deps.timeouts.compose, message, &history).await
        }
    };

    log.append(session_id, ChatRole::User, message).await?;
    log.append(session_id, ChatRole::Assistant, &text).await?;
    drop(agent);

    stream.send_text(&text).await;
    Ok(())
}

/// Gate, then search when the gate accepts. Only an auth failure escapes.
async fn route<R: SearchRecord>(
    deps: &AgentDeps,
    agent: &mut SearchAgent<R>,
    session_id: Uuid,
    message: &str,
    history: &[ChatMessage],
    token: &str,
) -> Result<Route<R>, AgentError> {
    let decision = agent.gate(deps, message, history).await;
    info!("Session {session_id}: {} gate -> {decision:?}", R::KIND.plural());

    Ok(match decision {
        IntentDecision::Handle => {
            let outcome = agent.search(deps, message, history, token).await?;
            debug!(
                "Session {session_id}: {} of {} shown, filter {:?}",
                agent.state().current_offset(),
                outcome.total,
                outcome.filter
            );
            Route::Search(outcome)
        }
        IntentDecision::Clarify => Route::Clarify,
        IntentDecision::Decline => Route::Decline,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::agent::testing::{candidate_deps_with, deps_with};
    use crate::chat::history::testing::InMemoryMessageLog;
    use crate::chat::prompts::TITLE_SYSTEM;
    use crate::llm_client::testing::ScriptedModel;
    use crate::models::record::{Candidate, Job};
    use crate::session::SessionRegistry;
    use crate::source::testing::FakeSource;
    use crate::streaming::testing::RecordingSink;
    use crate::streaming::ClientGone;

    const KIGALI_FILTER: &str =
        r#"{"role":null,"location":"Kigali","is_request_for_more":false}"#;

    fn job_service(model: Arc<ScriptedModel>, source: FakeSource) -> SearchService<Job> {
        SearchService::new(
            deps_with(model, Arc::new(source)),
            Arc::new(SessionRegistry::new()),
        )
    }

    fn kigali_source() -> FakeSource {
        FakeSource::default().with_category(
            "1",
            "Transport",
            vec![json!({"id": 1, "district": "Kigali"}), json!({"id": 2, "location": "Kigali City"})],
        )
    }

    fn input(session_id: Uuid, message: &str) -> TurnInput<'_> {
        TurnInput {
            session_id,
            message,
            token: "token",
        }
    }

    async fn run<R: SearchRecord>(
        service: &SearchService<R>,
        log: &InMemoryMessageLog,
        input: TurnInput<'_>,
    ) -> RecordingSink {
        let mut sink = RecordingSink::default();
        stream_turn(service, log, input, &mut sink, Duration::ZERO).await;
        sink
    }

    /// Notes how many model calls had been made when each event was written.
    struct CallCountingSink {
        model: Arc<ScriptedModel>,
        seen: Vec<(&'static str, usize)>,
    }

    #[async_trait]
    impl EventSink for CallCountingSink {
        async fn write_event(&mut self, event: &StreamEvent) -> Result<(), ClientGone> {
            self.seen.push((event.name(), self.model.calls()));
            Ok(())
        }

        async fn end(&mut self) {}
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupted_stream_keeps_full_reply_in_history() {
        let reply = "I found 2 jobs in Kigali.\nBoth are full-time.\nSay more for others.";
        let model = ScriptedModel::new()
            .reply(KIGALI_FILTER)
            .reply(reply)
            .reply_for(TITLE_SYSTEM, "Kigali jobs");
        let service = job_service(Arc::new(model), kigali_source());
        let log = InMemoryMessageLog::default();
        let session = Uuid::new_v4();
        // title + payload + first line's 6 words.
        let mut sink = RecordingSink {
            disconnect_after: Some(8),
            ..RecordingSink::default()
        };

        let delivery = stream_turn(
            &service,
            &log,
            input(session, "Show me jobs in Kigali"),
            &mut sink,
            Duration::from_millis(30),
        )
        .await;

        assert!(!delivery.completed);
        assert_eq!(sink.events[0], StreamEvent::Title { title: "Kigali jobs".to_string() });
        assert_eq!(sink.events[1].name(), "jobs");
        assert_eq!(sink.text(), "I found 2 jobs in Kigali.\n");
        let stored = log.messages(session);
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].content, "Show me jobs in Kigali");
        assert_eq!(stored[1].content, reply);
        assert_eq!(log.title(session).as_deref(), Some("Kigali jobs"));
    }

    #[tokio::test]
    async fn test_title_and_results_go_out_before_composition() {
        let model = Arc::new(
            ScriptedModel::new()
                .reply(KIGALI_FILTER)
                .reply("Two jobs in Kigali.")
                .reply_for(TITLE_SYSTEM, "Kigali jobs"),
        );
        let service = job_service(model.clone(), kigali_source());
        let log = InMemoryMessageLog::default();
        let mut sink = CallCountingSink {
            model: model.clone(),
            seen: Vec::new(),
        };

        stream_turn(
            &service,
            &log,
            input(Uuid::new_v4(), "Show me jobs in Kigali"),
            &mut sink,
            Duration::ZERO,
        )
        .await;

        // Extraction and title are done; the summary call has not started yet.
        assert_eq!(sink.seen[0], ("title", 2));
        assert_eq!(sink.seen[1], ("jobs", 2));
        assert_eq!(sink.seen[2], ("text", 3));
        assert_eq!(sink.seen.last(), Some(&("done", 3)));
    }

    #[tokio::test]
    async fn test_vague_request_gets_clarification_not_search() {
        let model = ScriptedModel::new()
            .reply(r#"{"should_handle": true, "has_specific_criteria": false, "is_follow_up": false}"#)
            .reply("Sure! What role and where?")
            .reply_for(TITLE_SYSTEM, "Hiring help");
        let source = Arc::new(FakeSource::default().with_category("1", "Transport", vec![]));
        let service = SearchService::<Candidate>::new(
            candidate_deps_with(Arc::new(model), source.clone()),
            Arc::new(SessionRegistry::new()),
        );
        let log = InMemoryMessageLog::default();

        let sink = run(&service, &log, input(Uuid::new_v4(), "I want to hire someone")).await;

        let names: Vec<&str> = sink.events.iter().map(StreamEvent::name).collect();
        assert!(!names.contains(&"candidates"));
        assert_eq!(names.first(), Some(&"title"));
        assert_eq!(sink.text(), "Sure! What role and where?");
        assert_eq!(source.record_fetches(), 0);
    }

    #[tokio::test]
    async fn test_declined_message_goes_to_generic_chat() {
        let model = ScriptedModel::new()
            .reply(r#"{"should_handle": false, "has_specific_criteria": false, "is_follow_up": false}"#)
            .reply("We are open on weekdays.");
        let service = job_service(Arc::new(model), FakeSource::default());
        let log = InMemoryMessageLog::default();
        let session = Uuid::new_v4();
        log.append(session, ChatRole::User, "hello").await.unwrap();

        let sink = run(&service, &log, input(session, "What are your office hours?")).await;

        assert_eq!(sink.text(), "We are open on weekdays.");
        assert!(sink.events.iter().all(|e| e.name() != "title"));
        assert_eq!(sink.events.last(), Some(&StreamEvent::Done));
    }

    #[tokio::test]
    async fn test_auth_failure_ends_stream_and_persists_nothing() {
        let source = FakeSource {
            unauthorized: true,
            ..FakeSource::default()
        };
        let model = ScriptedModel::new()
            .reply(r#"{"role":"driver","is_request_for_more":false}"#)
            .reply_for(TITLE_SYSTEM, "Driver jobs");
        let service = job_service(Arc::new(model), source);
        let log = InMemoryMessageLog::default();
        let session = Uuid::new_v4();

        let sink = run(&service, &log, input(session, "Show me driver jobs in Kigali")).await;

        assert_eq!(
            sink.events,
            vec![StreamEvent::Error {
                code: "AUTH_ERROR".to_string(),
                message: "Token expired".to_string()
            }]
        );
        assert!(sink.ended);
        assert!(log.messages(session).is_empty());
        assert!(log.title(session).is_none());
    }

    #[tokio::test]
    async fn test_blank_message_is_rejected() {
        assert!(matches!(
            input(Uuid::new_v4(), "   ").validate(),
            Err(AppError::Validation(_))
        ));
        let missing_token = TurnInput {
            token: " ",
            ..input(Uuid::new_v4(), "jobs in Huye")
        };
        assert!(matches!(missing_token.validate(), Err(AppError::Unauthorized(_))));

        let service = job_service(Arc::new(ScriptedModel::new()), FakeSource::default());
        let log = InMemoryMessageLog::default();
        let sink = run(&service, &log, input(Uuid::new_v4(), "   ")).await;
        assert_eq!(sink.events[0].name(), "error");
    }
}
