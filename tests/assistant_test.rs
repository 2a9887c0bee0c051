use std::sync::Arc;

use pretty_assertions::assert_eq;
use ram_tracker::chat::{APOLOGY_MESSAGE, WELCOME_MESSAGE};
use ram_tracker::mock::{MockBackend, MockReply};
use ram_tracker::tip::{EMPTY_TIP_FALLBACK, FAILED_TIP_FALLBACK};
use ram_tracker::{ChatClient, Role, SendOutcome, TipClient, Transcript};

#[tokio::test]
async fn tip_is_trimmed_model_text() {
    let backend = Arc::new(MockBackend::new().otherwise(MockReply::text(
        "  DDR5 prices are dropping; wait a week if you can.\n",
    )));
    let tips = TipClient::new(backend.clone(), "tip-model");

    assert_eq!(tips.get_tip().await, "DDR5 prices are dropping; wait a week if you can.");
    let requests = backend.requests();
    assert_eq!(requests[0].model, "tip-model");
    assert!(!requests[0].web_search);
}

#[tokio::test]
async fn tip_falls_back_on_empty_reply() {
    let tips = TipClient::new(Arc::new(MockBackend::new().otherwise(MockReply::text("   "))), "m");

    assert_eq!(tips.get_tip().await, EMPTY_TIP_FALLBACK);
}

#[tokio::test]
async fn blocked_tip_counts_as_empty() {
    let tips = TipClient::new(Arc::new(MockBackend::new().otherwise(MockReply::Blocked)), "m");

    assert_eq!(tips.get_tip().await, EMPTY_TIP_FALLBACK);
}

#[tokio::test]
async fn tip_falls_back_on_failure() {
    let tips = TipClient::new(Arc::new(MockBackend::new().otherwise(MockReply::fail("down"))), "m");

    assert_eq!(tips.get_tip().await, FAILED_TIP_FALLBACK);
}

#[tokio::test]
async fn streamed_reply_reads_as_one_message() {
    let backend = Arc::new(MockBackend::new().otherwise(MockReply::fragments(["Hel", "lo wor", "ld."])));
    let session = ChatClient::new(backend, "chat-model").create_session();
    let mut transcript = Transcript::with_welcome();

    let outcome = transcript.send(&session, "DDR4 or DDR5?", |_| {}).await;

    assert_eq!(outcome, SendOutcome::Replied);
    let texts: Vec<&str> = transcript.messages().iter().map(|m| m.text()).collect();
    assert_eq!(texts, vec![WELCOME_MESSAGE, "DDR4 or DDR5?", "Hello world."]);
    assert!(transcript.last().unwrap().is_final());
}

#[tokio::test]
async fn mid_stream_failure_keeps_partial_text() {
    let backend = Arc::new(MockBackend::new().otherwise(MockReply::FragmentsThenFail(
        vec!["DDR5 is".into()],
        "stream reset".into(),
    )));
    let session = ChatClient::new(backend, "chat-model").create_session();
    let mut transcript = Transcript::new();

    let outcome = transcript.send(&session, "which is faster?", |_| {}).await;

    assert_eq!(outcome, SendOutcome::Failed);
    let messages = transcript.messages();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[1].role(), Role::Assistant);
    assert_eq!(messages[1].text(), "DDR5 is");
    assert_eq!(messages[2].text(), APOLOGY_MESSAGE);
    assert!(session.history().is_empty());
}

#[tokio::test]
async fn failure_before_any_fragment_only_apologizes() {
    let backend = Arc::new(MockBackend::new().otherwise(MockReply::fail("unavailable")));
    let session = ChatClient::new(backend, "chat-model").create_session();
    let mut transcript = Transcript::new();

    let outcome = transcript.send(&session, "hello", |_| {}).await;

    assert_eq!(outcome, SendOutcome::Failed);
    let messages = transcript.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role(), Role::User);
    assert_eq!(messages[1].text(), APOLOGY_MESSAGE);
}

#[tokio::test]
async fn session_survives_a_failed_exchange() {
    let backend = Arc::new(
        MockBackend::new()
            .reply_when("broken", MockReply::fail("oops"))
            .otherwise(MockReply::text("CL30 is a good target.")),
    );
    let session = ChatClient::new(backend.clone(), "chat-model").create_session();
    let mut transcript = Transcript::new();

    transcript.send(&session, "broken question", |_| {}).await;
    let outcome = transcript.send(&session, "what latency?", |_| {}).await;

    assert_eq!(outcome, SendOutcome::Replied);
    assert_eq!(transcript.last().unwrap().text(), "CL30 is a good target.");
    let requests = backend.requests();
    assert_eq!(requests[1].turns.len(), 1);
    assert_eq!(session.history().len(), 2);
}
