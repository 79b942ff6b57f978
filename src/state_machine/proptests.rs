//! Property-based tests for the state machine
//!
//! These tests verify key invariants hold across all possible inputs.

use super::transition::*;
use super::*;
use crate::domain::{Message, MessageId, Role};
use chrono::Utc;
use proptest::prelude::*;

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_failure_kind() -> impl Strategy<Value = FailureKind> {
    prop_oneof![
        Just(FailureKind::Unauthorized),
        Just(FailureKind::Network),
        Just(FailureKind::Rejected),
    ]
}

fn arb_state() -> impl Strategy<Value = SyncState> {
    prop_oneof![
        Just(SyncState::Idle),
        Just(SyncState::Sending {
            provisional_id: MessageId::provisional()
        }),
        Just(SyncState::Reconciling),
        ("[a-zA-Z ]{1,30}", arb_failure_kind())
            .prop_map(|(message, kind)| SyncState::Failed { message, kind }),
    ]
}

fn arb_server_message() -> impl Strategy<Value = Message> {
    (1i64..1000, any::<bool>(), "[a-zA-Z ]{1,30}").prop_map(|(id, user, content)| Message {
        id: MessageId::Server(id),
        role: if user { Role::User } else { Role::Assistant },
        content,
        timestamp: Utc::now(),
    })
}

fn arb_send_event() -> impl Strategy<Value = Event> {
    "[a-zA-Z ]{0,30}".prop_map(|content| Event::SendRequested {
        message: Message::provisional(content),
    })
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        arb_send_event(),
        Just(Event::TransmitSucceeded),
        ("[a-zA-Z ]{1,30}", arb_failure_kind())
            .prop_map(|(message, kind)| Event::TransmitFailed { message, kind }),
        proptest::collection::vec(arb_server_message(), 0..5)
            .prop_map(|messages| Event::MessagesFetched { messages }),
        ("[a-zA-Z ]{1,30}", arb_failure_kind())
            .prop_map(|(message, kind)| Event::FetchFailed { message, kind }),
        Just(Event::FailureAcknowledged),
    ]
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // Rejected events leave the state untouched, so replaying the accepted
    // effects keeps the transcript consistent with the state
    #[test]
    fn prop_transcript_matches_state(events in proptest::collection::vec(arb_event(), 0..30)) {
        let mut state = SyncState::Idle;
        let mut transcript: Vec<Message> = Vec::new();

        for event in events {
            let Ok(result) = transition(&state, event) else {
                continue;
            };
            for effect in &result.effects {
                effect.apply_to(&mut transcript);
                if let Effect::ReplaceMessages { messages } = effect {
                    prop_assert_eq!(&transcript, messages);
                }
            }
            state = result.new_state;

            if let SyncState::Sending { provisional_id } = &state {
                prop_assert!(transcript.last().is_some_and(|m| m.id == *provisional_id));
            }
        }
    }

    // At most one outstanding send: a send is accepted only when not busy
    #[test]
    fn prop_busy_rejects_sends(state in arb_state(), event in arb_send_event()) {
        let busy = state.is_busy();
        let blank = matches!(&event, Event::SendRequested { message } if message.content.trim().is_empty());

        match transition(&state, event) {
            Ok(result) => {
                prop_assert!(!busy && !blank);
                prop_assert!(matches!(result.new_state, SyncState::Sending { .. }), "expected Sending");
            }
            Err(TransitionError::EmptyContent) => prop_assert!(blank),
            Err(TransitionError::Busy) => prop_assert!(busy && !blank),
            Err(e) => prop_assert!(false, "unexpected error: {e}"),
        }
    }

    // Every entry into Failed notifies exactly once
    #[test]
    fn prop_failure_notifies_once(state in arb_state(), event in arb_event()) {
        if let Ok(result) = transition(&state, event) {
            let notices = result
                .effects
                .iter()
                .filter(|e| matches!(e, Effect::NotifyError { .. }))
                .count();
            let entered_failed = result.new_state.is_failed() && !state.is_failed();
            prop_assert_eq!(notices, usize::from(entered_failed));
        }
    }

    // Failed is always recoverable, by acknowledgement or a new send
    #[test]
    fn prop_failed_always_recoverable(
        message in "[a-zA-Z ]{1,30}",
        kind in arb_failure_kind()
    ) {
        let state = SyncState::Failed { message, kind };

        let ack = transition(&state, Event::FailureAcknowledged);
        prop_assert!(ack.is_ok(), "acknowledge failed: {:?}", ack);
        prop_assert_eq!(ack.unwrap().new_state, SyncState::Idle);

        let retry = transition(&state, Event::SendRequested { message: Message::provisional("retry") });
        prop_assert!(retry.is_ok(), "retry failed: {:?}", retry);
        prop_assert!(retry.unwrap().new_state.is_busy(), "retry should start sending");
    }
}
