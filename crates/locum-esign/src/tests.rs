//! Integration tests for the lifecycle manager over the sandbox provider.

use std::{
  collections::BTreeMap,
  sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
  },
  time::Duration,
};

use locum_core::{
  provider::SignatureProvider,
  submission::{EventKind, NewSubmission, SubmissionStatus, Submitter},
  template::Template,
  Error,
};

use crate::{DeliveryTiming, LifecycleManager, SandboxProvider};

fn fast_timing() -> DeliveryTiming {
  DeliveryTiming {
    send_delay: Duration::from_millis(10),
    open_delay: Duration::from_millis(40),
    expires_in: None,
  }
}

async fn manager() -> LifecycleManager<SandboxProvider> {
  let m = LifecycleManager::new(SandboxProvider::new(), fast_timing());
  m.initialize().await.expect("initialize");
  m.sync_templates().await.expect("sync");
  m
}

fn new_submission(email: &str) -> NewSubmission {
  NewSubmission {
    template_id: "template_001".into(),
    submitters:  vec![Submitter::new(email)],
    send_email:  false,
    message:     None,
    metadata:    BTreeMap::new(),
  }
}

/// Promote a freshly created submission to `sent` the way a provider
/// webhook would.
async fn sent_submission(
  m: &LifecycleManager<SandboxProvider>,
  email: &str,
) -> String {
  let sub = m.create_submission(new_submission(email)).await.unwrap();
  m.ingest_event(&sub.id, EventKind::Sent).await.unwrap();
  sub.id
}

// ─── Initialisation ──────────────────────────────────────────────────────────

#[tokio::test]
async fn mutations_before_initialize_are_refused() {
  let m = LifecycleManager::new(SandboxProvider::new(), fast_timing());
  let err = m.create_submission(new_submission("a@x.com")).await.unwrap_err();
  assert!(matches!(err, Error::NotInitialized));
}

#[tokio::test]
async fn initialize_surfaces_provider_outage() {
  let provider = SandboxProvider::new();
  provider.set_offline(true);
  let m = LifecycleManager::new(provider, fast_timing());
  let err = m.initialize().await.unwrap_err();
  assert!(matches!(err, Error::Provider(_)));
}

// ─── Templates ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn sync_templates_populates_the_cache() {
  let m = LifecycleManager::new(SandboxProvider::new(), fast_timing());
  m.initialize().await.unwrap();

  let count = m.sync_templates().await.unwrap();
  assert_eq!(count, 2);
  assert_eq!(m.templates().len(), 2);

  let tpl = m.template("template_001").unwrap();
  assert_eq!(tpl.name, "Employment Agreement");
  assert!(m.template("template_999").is_none());
}

// ─── Creation validation ─────────────────────────────────────────────────────

#[tokio::test]
async fn unknown_template_is_rejected_before_any_mutation() {
  let m = manager().await;
  let mut new = new_submission("a@x.com");
  new.template_id = "template_999".into();

  let err = m.create_submission(new).await.unwrap_err();
  assert!(matches!(err, Error::TemplateNotFound(_)));
}

#[tokio::test]
async fn empty_submitter_list_is_rejected() {
  let m = manager().await;
  let mut new = new_submission("a@x.com");
  new.submitters.clear();

  let err = m.create_submission(new).await.unwrap_err();
  assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn provider_failure_during_creation_is_reported_synchronously() {
  struct FlakyProvider {
    fail_create: Arc<AtomicBool>,
  }

  impl SignatureProvider for FlakyProvider {
    type Error = Error;

    async fn test_connection(&self) -> Result<(), Error> { Ok(()) }

    async fn list_templates(&self) -> Result<Vec<Template>, Error> {
      Ok(vec![Template {
        id:     "template_001".into(),
        name:   "T".into(),
        fields: vec![],
      }])
    }

    async fn create_submission(
      &self,
      _: &Template,
      _: &[Submitter],
      _: Option<&str>,
    ) -> Result<String, Error> {
      if self.fail_create.load(Ordering::SeqCst) {
        Err(Error::Provider("503 from provider".into()))
      } else {
        Ok("sub_flaky".into())
      }
    }

    async fn fetch_completed_documents(
      &self,
      _: &locum_core::submission::Submission,
      _: Option<&Template>,
    ) -> Result<locum_core::storage::StoredBlob, Error> {
      Err(Error::Provider("unsupported".into()))
    }
  }

  let fail_create = Arc::new(AtomicBool::new(true));
  let m = LifecycleManager::new(
    FlakyProvider { fail_create: Arc::clone(&fail_create) },
    fast_timing(),
  );
  m.initialize().await.unwrap();
  m.sync_templates().await.unwrap();

  let err = m.create_submission(new_submission("a@x.com")).await.unwrap_err();
  assert!(matches!(err, Error::Provider(_)));

  // Nothing was recorded for the failed creation.
  assert!(m.submission("sub_flaky").await.is_none());

  fail_create.store(false, Ordering::SeqCst);
  let sub = m.create_submission(new_submission("a@x.com")).await.unwrap();
  assert_eq!(sub.status, SubmissionStatus::Pending);
}

// ─── Simulated delivery ──────────────────────────────────────────────────────

#[tokio::test]
async fn send_email_walks_pending_sent_opened() {
  let m = manager().await;
  let mut new = new_submission("a@x.com");
  new.send_email = true;

  let sub = m.create_submission(new).await.unwrap();
  assert_eq!(sub.status, SubmissionStatus::Pending);

  tokio::time::sleep(Duration::from_millis(25)).await;
  let mid = m.submission(&sub.id).await.unwrap();
  assert_eq!(mid.status, SubmissionStatus::Sent);
  assert!(mid.sent_at.is_some());

  tokio::time::sleep(Duration::from_millis(60)).await;
  let later = m.submission(&sub.id).await.unwrap();
  assert_eq!(later.status, SubmissionStatus::Opened);
  assert!(later.submitters[0].viewed_at.is_some());
}

#[tokio::test]
async fn completing_preempts_the_scheduled_open_timer() {
  let m = LifecycleManager::new(
    SandboxProvider::new(),
    DeliveryTiming {
      send_delay: Duration::from_millis(10),
      open_delay: Duration::from_millis(100),
      expires_in: None,
    },
  );
  m.initialize().await.unwrap();
  m.sync_templates().await.unwrap();

  let mut new = new_submission("a@x.com");
  new.send_email = true;
  let sub = m.create_submission(new).await.unwrap();

  tokio::time::sleep(Duration::from_millis(40)).await;
  m.complete_submission(&sub.id, None).await.unwrap();

  // The pending `opened` timer must not fire over the terminal state.
  tokio::time::sleep(Duration::from_millis(150)).await;
  let final_state = m.submission(&sub.id).await.unwrap();
  assert_eq!(final_state.status, SubmissionStatus::Completed);
}

#[tokio::test]
async fn unsent_submission_expires_after_the_configured_window() {
  let m = LifecycleManager::new(
    SandboxProvider::new(),
    DeliveryTiming {
      send_delay: Duration::from_millis(10),
      open_delay: Duration::from_secs(60),
      expires_in: Some(Duration::from_millis(50)),
    },
  );
  m.initialize().await.unwrap();
  m.sync_templates().await.unwrap();

  let mut new = new_submission("a@x.com");
  new.send_email = true;
  let sub = m.create_submission(new).await.unwrap();

  tokio::time::sleep(Duration::from_millis(25)).await;
  let mid = m.submission(&sub.id).await.unwrap();
  assert_eq!(mid.status, SubmissionStatus::Sent);
  assert!(mid.expires_at.is_some());

  tokio::time::sleep(Duration::from_millis(100)).await;
  let expired = m.submission(&sub.id).await.unwrap();
  assert_eq!(expired.status, SubmissionStatus::Expired);
}

// ─── Transitions ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn complete_from_sent_records_values_and_documents() {
  let m = manager().await;
  let id = sent_submission(&m, "a@x.com").await;

  let mut values = BTreeMap::new();
  values.insert(
    "full_name".to_string(),
    serde_json::Value::String("John Doe".into()),
  );

  let sub = m.complete_submission(&id, Some(values)).await.unwrap();
  assert_eq!(sub.status, SubmissionStatus::Completed);
  assert!(sub.completed_at.is_some());
  assert_eq!(
    sub.submitters[0].values.as_ref().unwrap()["full_name"],
    serde_json::Value::String("John Doe".into())
  );

  let doc = m.download_documents(&id).await.unwrap();
  assert_eq!(doc.content_type, "application/pdf");
  assert!(doc.bytes.starts_with(b"%PDF"));
}

#[tokio::test]
async fn complete_twice_fails_and_leaves_state_unchanged() {
  let m = manager().await;
  let id = sent_submission(&m, "a@x.com").await;

  m.complete_submission(&id, None).await.unwrap();
  let err = m.complete_submission(&id, None).await.unwrap_err();
  assert!(matches!(
    err,
    Error::InvalidTransition { from: SubmissionStatus::Completed, .. }
  ));

  let sub = m.submission(&id).await.unwrap();
  assert_eq!(sub.status, SubmissionStatus::Completed);
}

#[tokio::test]
async fn complete_from_pending_is_illegal() {
  let m = manager().await;
  let sub = m.create_submission(new_submission("a@x.com")).await.unwrap();

  let err = m.complete_submission(&sub.id, None).await.unwrap_err();
  assert!(matches!(
    err,
    Error::InvalidTransition { from: SubmissionStatus::Pending, .. }
  ));
}

#[tokio::test]
async fn documents_require_completion() {
  let m = manager().await;
  let id = sent_submission(&m, "a@x.com").await;

  let err = m.download_documents(&id).await.unwrap_err();
  assert!(matches!(err, Error::NotCompleted(_)));
}

#[tokio::test]
async fn expire_then_resend_returns_to_sent() {
  let m = manager().await;
  let id = sent_submission(&m, "a@x.com").await;

  let expired = m.expire_submission(&id).await.unwrap();
  assert_eq!(expired.status, SubmissionStatus::Expired);

  let resent = m.resend_submission(&id).await.unwrap();
  assert_eq!(resent.status, SubmissionStatus::Sent);
  assert!(resent.sent_at.is_some());
}

#[tokio::test]
async fn resend_discards_viewer_progress() {
  let m = manager().await;
  let id = sent_submission(&m, "a@x.com").await;
  m.ingest_event(&id, EventKind::Opened).await.unwrap();

  let resent = m.resend_submission(&id).await.unwrap();
  assert_eq!(resent.status, SubmissionStatus::Sent);
  assert!(resent.submitters[0].viewed_at.is_none());
  assert!(resent.submitters[0].values.is_none());
}

#[tokio::test]
async fn resend_is_refused_for_terminal_and_pending_states() {
  let m = manager().await;

  let pending = m.create_submission(new_submission("a@x.com")).await.unwrap();
  assert!(matches!(
    m.resend_submission(&pending.id).await.unwrap_err(),
    Error::InvalidTransition { from: SubmissionStatus::Pending, .. }
  ));

  let done = sent_submission(&m, "b@x.com").await;
  m.complete_submission(&done, None).await.unwrap();
  assert!(matches!(
    m.resend_submission(&done).await.unwrap_err(),
    Error::InvalidTransition { from: SubmissionStatus::Completed, .. }
  ));
}

#[tokio::test]
async fn resend_unknown_id_is_not_found() {
  let m = manager().await;
  let err = m.resend_submission("sub_missing").await.unwrap_err();
  assert!(matches!(err, Error::SubmissionNotFound(_)));
}

#[tokio::test]
async fn decline_is_legal_from_any_non_terminal_state() {
  let m = manager().await;

  let pending = m.create_submission(new_submission("a@x.com")).await.unwrap();
  let declined = m.decline_submission(&pending.id).await.unwrap();
  assert_eq!(declined.status, SubmissionStatus::Declined);

  // Declined is terminal: nothing moves it.
  assert!(m.resend_submission(&pending.id).await.is_err());
  assert!(m.complete_submission(&pending.id, None).await.is_err());
}

// ─── Queries ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn submissions_by_employee_filters_and_preserves_creation_order() {
  let m = manager().await;

  let mut first = new_submission("a@x.com");
  first.metadata.insert("employee_id".into(), "emp-7".into());
  let mut other = new_submission("b@x.com");
  other.metadata.insert("employee_id".into(), "emp-8".into());
  let mut second = new_submission("c@x.com");
  second.metadata.insert("employee_id".into(), "emp-7".into());

  let a = m.create_submission(first).await.unwrap();
  m.create_submission(other).await.unwrap();
  let c = m.create_submission(second).await.unwrap();

  let mine = m.submissions_by_employee("emp-7").await;
  assert_eq!(mine.len(), 2);
  assert_eq!(mine[0].id, a.id);
  assert_eq!(mine[1].id, c.id);
}

#[tokio::test]
async fn unknown_submission_reads_as_none() {
  let m = manager().await;
  assert!(m.submission("sub_missing").await.is_none());
}

// ─── Callbacks ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn callbacks_fire_for_every_transition() {
  let m = manager().await;
  let sub = m.create_submission(new_submission("a@x.com")).await.unwrap();

  let seen: Arc<Mutex<Vec<EventKind>>> = Arc::new(Mutex::new(Vec::new()));
  let sink = Arc::clone(&seen);
  m.register_callback(&sub.id, move |event| {
    sink.lock().unwrap().push(event.event);
  })
  .await
  .unwrap();

  m.ingest_event(&sub.id, EventKind::Sent).await.unwrap();
  m.ingest_event(&sub.id, EventKind::Opened).await.unwrap();
  m.complete_submission(&sub.id, None).await.unwrap();

  let events = seen.lock().unwrap().clone();
  assert_eq!(
    events,
    vec![EventKind::Sent, EventKind::Opened, EventKind::Completed]
  );
}

#[tokio::test]
async fn panicking_callback_is_isolated() {
  let m = manager().await;

  let noisy = m.create_submission(new_submission("a@x.com")).await.unwrap();
  let quiet = m.create_submission(new_submission("b@x.com")).await.unwrap();

  m.register_callback(&noisy.id, |_| panic!("handler bug"))
    .await
    .unwrap();

  let seen: Arc<Mutex<Vec<EventKind>>> = Arc::new(Mutex::new(Vec::new()));
  let sink = Arc::clone(&seen);
  m.register_callback(&quiet.id, move |event| {
    sink.lock().unwrap().push(event.event);
  })
  .await
  .unwrap();

  // The panicking handler must not abort its own transition…
  m.ingest_event(&noisy.id, EventKind::Sent).await.unwrap();
  assert_eq!(
    m.submission(&noisy.id).await.unwrap().status,
    SubmissionStatus::Sent
  );

  // …nor block delivery to the other submission's handler.
  m.ingest_event(&quiet.id, EventKind::Sent).await.unwrap();
  assert_eq!(seen.lock().unwrap().as_slice(), &[EventKind::Sent]);
}

// ─── Races ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn racing_complete_and_expire_produce_one_legal_winner() {
  let m = manager().await;
  let id = sent_submission(&m, "a@x.com").await;

  let m1 = m.clone();
  let m2 = m.clone();
  let id1 = id.clone();
  let id2 = id.clone();

  let (complete_res, expire_res) = tokio::join!(
    tokio::spawn(async move { m1.complete_submission(&id1, None).await }),
    tokio::spawn(async move { m2.expire_submission(&id2).await }),
  );
  let complete_res = complete_res.unwrap();
  let expire_res = expire_res.unwrap();

  // Exactly one racer wins; the loser is refused, never half-applied.
  assert_ne!(complete_res.is_ok(), expire_res.is_ok());

  let final_state = m.submission(&id).await.unwrap().status;
  if complete_res.is_ok() {
    assert_eq!(final_state, SubmissionStatus::Completed);
  } else {
    assert_eq!(final_state, SubmissionStatus::Expired);
  }
}
