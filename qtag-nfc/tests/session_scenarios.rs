//! End-to-end session behavior against the simulated transport

mod helpers;

use helpers::{controller, invalidation, tag_with, touched_tag, RecordingStore};
use qtag_common::{ScanContext, TagEvent};
use qtag_nfc::codec::{self, NdefMessage, RecordProfile};
use qtag_nfc::session::{CapabilityError, SessionPhase};
use qtag_nfc::transport::simulated::{FaultPlan, DEFAULT_CAPACITY};
use qtag_nfc::transport::{SimulatedTransport, TagImage, TransportCall};
use qtag_nfc::{
    classify, ConsumerAction, ControllerHandle, FailureReason, Identifier, Role, ScanConsumer,
    ScanResult, SessionError, WriteRequest,
};
use std::time::Duration;

#[tokio::test]
async fn test_customer_tag_rejected_in_normal_flow() {
    let profile = RecordProfile::default();
    let message = codec::encode(&Identifier::new("Q1", Role::Secondary), &profile);
    assert_eq!(message.len(), 1);

    let decoded = codec::decode(message.records(), &profile);
    let outcome = classify(decoded.as_ref(), ScanContext::Normal);
    assert!(!outcome.succeeded());
    assert_eq!(
        outcome.failure_reason(),
        FailureReason::CustomerTagScanned.to_string()
    );

    // Same tag through a full read session
    let transport = SimulatedTransport::new(tag_with("Q1", Role::Secondary));
    let mut ctl = controller(&transport);
    let result = ctl.start_read(ScanContext::Normal).await.unwrap();
    assert_eq!(result, ScanResult::Failure(FailureReason::CustomerTagScanned));
}

#[tokio::test]
async fn test_staff_tag_url_record_alone_is_enough() {
    let profile = RecordProfile::default();
    let message = codec::encode(&Identifier::new("Q1", Role::Primary), &profile);
    assert_eq!(message.len(), 2);

    let decoded = codec::decode(&message.records()[..1], &profile);
    let outcome = classify(decoded.as_ref(), ScanContext::Normal);
    assert!(outcome.succeeded());
    assert_eq!(outcome.identifier, Some(Identifier::new("Q1", Role::Primary)));

    // A reader seeing only the URL record
    let mut image = TagImage::blank(DEFAULT_CAPACITY);
    image.content = NdefMessage::new(message.records()[..1].to_vec()).to_bytes();
    let transport = SimulatedTransport::new(image);
    let result = controller(&transport)
        .start_read(ScanContext::Normal)
        .await
        .unwrap();
    assert_eq!(result.identifier(), Some(&Identifier::new("Q1", Role::Primary)));
}

#[tokio::test]
async fn test_read_only_tag_never_written() {
    let message = codec::encode(&Identifier::new("OLD", Role::Primary), &RecordProfile::default());
    let transport = SimulatedTransport::new(TagImage::read_only(&message));
    let mut ctl = controller(&transport);

    let err = ctl
        .start_write(WriteRequest::new(Identifier::new("Q2", Role::Primary), false))
        .await
        .unwrap_err();

    assert_eq!(err, SessionError::Capability(CapabilityError::NotWritable));
    let calls = transport.calls();
    assert!(!touched_tag(&calls));
    assert_eq!(invalidation(&calls).as_deref(), Some("Tag is not writable"));
    assert_eq!(transport.tag().unwrap().content, message.to_bytes());
}

#[tokio::test]
async fn test_undersized_tag_names_required_size() {
    let payload = Identifier::new("slot-".repeat(16), Role::Primary);
    let required = codec::encode(&payload, &RecordProfile::default()).byte_len();
    assert!(required > 64);

    let transport = SimulatedTransport::new(TagImage::blank(64));
    let mut ctl = controller(&transport);
    let err = ctl
        .start_write(WriteRequest::new(payload, true))
        .await
        .unwrap_err();

    assert_eq!(err, SessionError::Capacity { required, available: 64 });
    let calls = transport.calls();
    assert!(!touched_tag(&calls));
    let message = invalidation(&calls).unwrap();
    assert!(message.contains(&required.to_string()));
}

#[tokio::test]
async fn test_contexts_never_see_each_others_results() {
    let transport = SimulatedTransport::new(tag_with("STAFF", Role::Primary));
    let mut ctl = controller(&transport);
    let results = ctl.results();
    let normal = ScanConsumer::new(ScanContext::Normal, results.clone());
    let diagnostics = ScanConsumer::new(ScanContext::Diagnostics, results.clone());
    let store = RecordingStore::default();

    ctl.start_read(ScanContext::Normal).await.unwrap();
    assert!(results.has_changed(ScanContext::Normal));
    assert!(!results.has_changed(ScanContext::Diagnostics));
    assert!(diagnostics.poll().is_none());

    let action = normal.next_and_handle(&store).await.unwrap();
    assert_eq!(action, ConsumerAction::Completed { id: "STAFF".to_string() });

    transport.present(tag_with("GUEST", Role::Secondary));
    ctl.start_read(ScanContext::Diagnostics).await.unwrap();
    assert!(!results.has_changed(ScanContext::Normal));
    assert!(normal.poll().is_none());
    assert_eq!(
        results.latest(ScanContext::Normal).unwrap().identifier().unwrap().id,
        "STAFF"
    );

    match diagnostics.next_and_handle(&store).await.unwrap() {
        ConsumerAction::DetailFetched { id, .. } => assert_eq!(id, "GUEST"),
        other => panic!("expected detail fetch, got {:?}", other),
    }
    assert_eq!(store.calls(), vec!["complete:STAFF", "detail:GUEST"]);
}

#[tokio::test]
async fn test_write_then_read_back() {
    let transport = SimulatedTransport::new(TagImage::blank(DEFAULT_CAPACITY));
    let mut ctl = controller(&transport);

    let report = ctl
        .start_write(WriteRequest::new(Identifier::new("Q7", Role::Primary), false))
        .await
        .unwrap();
    assert!(!report.locked);

    let result = ctl.start_read(ScanContext::Normal).await.unwrap();
    match result {
        ScanResult::Success(observed) => {
            assert_eq!(observed.identifier, Identifier::new("Q7", Role::Primary));
            assert!(!observed.is_read_only);
        }
        other => panic!("expected success, got {:?}", other),
    }
}

#[tokio::test]
async fn test_locked_tag_reads_as_read_only() {
    let transport = SimulatedTransport::new(TagImage::blank(DEFAULT_CAPACITY));
    let mut ctl = controller(&transport);

    ctl.start_write(WriteRequest::new(Identifier::new("Q8", Role::Secondary), true))
        .await
        .unwrap();
    let result = ctl.start_read(ScanContext::Diagnostics).await.unwrap();

    match result {
        ScanResult::Success(observed) => {
            assert_eq!(observed.identifier.role, Role::Secondary);
            assert!(observed.is_read_only);
        }
        other => panic!("expected success, got {:?}", other),
    }

    // A second write is refused
    let err = ctl
        .start_write(WriteRequest::new(Identifier::new("Q9", Role::Secondary), false))
        .await
        .unwrap_err();
    assert_eq!(err, SessionError::Capability(CapabilityError::NotWritable));
}

#[tokio::test]
async fn test_hardware_error_text_forwarded_verbatim() {
    let transport = SimulatedTransport::new(tag_with("Q1", Role::Primary)).with_faults(FaultPlan {
        read: Some("Tag response error (code 102)".to_string()),
        ..FaultPlan::default()
    });
    let mut ctl = controller(&transport);
    let results = ctl.results();

    let err = ctl.start_read(ScanContext::Normal).await.unwrap_err();

    assert_eq!(err, SessionError::Io("Tag response error (code 102)".to_string()));
    assert_eq!(
        invalidation(&transport.calls()).as_deref(),
        Some("Tag response error (code 102)")
    );
    assert!(!results.has_changed(ScanContext::Normal));
}

#[tokio::test]
async fn test_lock_failure_leaves_payload_written() {
    let transport = SimulatedTransport::new(TagImage::blank(DEFAULT_CAPACITY)).with_faults(FaultPlan {
        lock: Some("Lock not supported".to_string()),
        ..FaultPlan::default()
    });
    let mut ctl = controller(&transport);

    let err = ctl
        .start_write(WriteRequest::new(Identifier::new("Q4", Role::Primary), true))
        .await
        .unwrap_err();

    assert_eq!(err, SessionError::Lock("Lock not supported".to_string()));
    assert!(err.is_partial_write());

    transport.set_faults(FaultPlan::default());
    let result = ctl.start_read(ScanContext::Normal).await.unwrap();
    assert_eq!(result.identifier(), Some(&Identifier::new("Q4", Role::Primary)));
}

#[tokio::test]
async fn test_user_dismissal_invalidates_session() {
    let transport = SimulatedTransport::new(tag_with("Q1", Role::Primary)).with_faults(FaultPlan {
        cancel_detect: true,
        ..FaultPlan::default()
    });
    let mut ctl = controller(&transport);

    let err = ctl.start_read(ScanContext::Diagnostics).await.unwrap_err();

    assert_eq!(err, SessionError::Cancelled);
    assert!(!transport.is_active());
    assert!(ctl.state().is_idle());
}

#[tokio::test]
async fn test_platform_rejection_opens_no_session() {
    let transport = SimulatedTransport::new(tag_with("Q1", Role::Primary)).with_faults(FaultPlan {
        reject_begin: Some("Proximity reading unavailable".to_string()),
        ..FaultPlan::default()
    });
    let mut ctl = controller(&transport);
    let mut events = ctl.events().subscribe();

    let err = ctl.start_read(ScanContext::Normal).await.unwrap_err();

    assert_eq!(
        err,
        SessionError::Rejected("Proximity reading unavailable".to_string())
    );
    assert_eq!(
        transport.calls(),
        vec![TransportCall::Begin("Hold the tag near the top of the device".to_string())]
    );
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_handle_rejects_overlap_and_cancels() {
    let transport = SimulatedTransport::without_tag();
    let handle = ControllerHandle::new(controller(&transport));
    let mut events = handle.events().subscribe();

    let pending = handle.start_read(ScanContext::Normal).unwrap();
    assert!(matches!(
        handle.start_write(WriteRequest::new(Identifier::new("Q1", Role::Primary), false)),
        Err(SessionError::Busy)
    ));

    // Let the session reach tag detection before cancelling
    let opened = tokio::time::timeout(Duration::from_secs(1), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(opened.event_type(), "SessionOpened");

    pending.cancel();
    assert_eq!(pending.join().await.unwrap_err(), SessionError::Cancelled);
    assert_eq!(handle.phase(), SessionPhase::Idle);

    match events.recv().await.unwrap() {
        TagEvent::SessionInvalidated { message, .. } => assert_eq!(message, "Session cancelled"),
        other => panic!("expected invalidation, got {:?}", other),
    }
    assert!(!handle.is_busy());
}

#[tokio::test]
async fn test_hardware_write_failure_forwarded_verbatim() {
    let transport = SimulatedTransport::new(TagImage::blank(DEFAULT_CAPACITY)).with_faults(FaultPlan {
        write: Some("Tag connection lost during write".to_string()),
        ..FaultPlan::default()
    });
    let mut ctl = controller(&transport);

    let err = ctl
        .start_write(WriteRequest::new(Identifier::new("Q3", Role::Primary), true))
        .await
        .unwrap_err();

    assert_eq!(err, SessionError::Io("Tag connection lost during write".to_string()));
    assert!(!err.is_partial_write());
    let calls = transport.calls();
    assert!(!calls.contains(&TransportCall::Lock));
    assert_eq!(
        invalidation(&calls).as_deref(),
        Some("Tag connection lost during write")
    );
    let tag = transport.tag().unwrap();
    assert_eq!(tag.content, NdefMessage::empty().to_bytes());
    assert!(!tag.locked);
}

#[tokio::test]
async fn test_unsupported_tag_refused_for_write() {
    let transport = SimulatedTransport::new(TagImage::unsupported());
    let mut ctl = controller(&transport);

    let err = ctl
        .start_write(WriteRequest::new(Identifier::new("Q3", Role::Secondary), false))
        .await
        .unwrap_err();

    assert_eq!(err, SessionError::Capability(CapabilityError::Unsupported));
    let calls = transport.calls();
    assert!(!touched_tag(&calls));
    assert_eq!(
        invalidation(&calls).as_deref(),
        Some("Tag is not in the supported format")
    );
    assert_eq!(transport.tag().unwrap(), TagImage::unsupported());
}

#[tokio::test]
async fn test_cancel_during_write_reports_completed_write() {
    let transport = SimulatedTransport::new(TagImage::blank(DEFAULT_CAPACITY)).with_faults(FaultPlan {
        write_ack_delay: Some(Duration::from_millis(50)),
        ..FaultPlan::default()
    });
    let handle = ControllerHandle::new(controller(&transport));
    let mut events = handle.events().subscribe();

    let task = handle
        .start_write(WriteRequest::new(Identifier::new("Q1", Role::Primary), true))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    task.cancel();

    let report = task.join().await.unwrap();
    assert!(report.locked);
    let tag = transport.tag().unwrap();
    assert!(tag.locked);
    assert_eq!(tag.content.len(), report.bytes);

    let mut written = None;
    while let Ok(event) = events.try_recv() {
        if let TagEvent::TagWritten { locked, .. } = event {
            written = Some(locked);
        }
    }
    assert_eq!(written, Some(true));
}
