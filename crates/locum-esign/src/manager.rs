//! [`LifecycleManager`] — the authoritative submission state machine.
//!
//! All submission state lives in memory, one slot per submission, each
//! guarded by its own async mutex: mutations on the same id are serialized,
//! mutations on different ids run freely in parallel, and there is no global
//! lock. Racing transitions are resolved by lock-acquisition order — the
//! first to take the slot wins, later racers are judged against the
//! post-winner state and refused with `InvalidTransition` if no longer legal.
//!
//! Timer-simulated delivery (`sent` → `opened`, optional expiry) stands in
//! for the provider's webhook channel. Every scheduled timer carries the
//! epoch of the slot at scheduling time; explicit transitions bump the
//! epoch, so a stale timer firing after a terminal state is a no-op.

use std::{
  collections::{BTreeMap, HashMap},
  panic::{catch_unwind, AssertUnwindSafe},
  sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, RwLock,
  },
  time::Duration,
};

use chrono::Utc;

use locum_core::{
  provider::SignatureProvider,
  storage::StoredBlob,
  submission::{
    EventKind, NewSubmission, Submission, SubmissionEvent, SubmissionStatus,
  },
  template::Template,
  Error, Result,
};

// ─── Timing ──────────────────────────────────────────────────────────────────

/// Delays used by the simulated delivery chain. Production deployments feed
/// transitions through `ingest_event` from a real webhook instead.
#[derive(Debug, Clone)]
pub struct DeliveryTiming {
  /// `pending` → `sent` after creation (when `send_email` is set).
  pub send_delay: Duration,
  /// `sent` → `opened`.
  pub open_delay: Duration,
  /// When set, a sent submission expires this long after sending unless
  /// completed or declined first.
  pub expires_in: Option<Duration>,
}

impl Default for DeliveryTiming {
  fn default() -> Self {
    Self {
      send_delay: Duration::from_millis(500),
      open_delay: Duration::from_secs(2),
      expires_in: None,
    }
  }
}

// ─── Slots ───────────────────────────────────────────────────────────────────

type Callback = Box<dyn Fn(&SubmissionEvent) + Send + Sync>;

struct SlotState {
  submission: Submission,
  /// Bumped on every explicit transition; timers scheduled under an older
  /// epoch are discarded when they fire.
  epoch:      u64,
  callback:   Option<Callback>,
}

struct Slot {
  state: tokio::sync::Mutex<SlotState>,
}

#[derive(Default)]
struct SlotIndex {
  by_id: HashMap<String, Arc<Slot>>,
  /// Creation order, for ordered reads.
  order: Vec<String>,
}

// ─── Manager ─────────────────────────────────────────────────────────────────

struct Inner<P> {
  provider:    P,
  timing:      DeliveryTiming,
  initialized: AtomicBool,
  templates:   RwLock<Vec<Template>>,
  slots:       Mutex<SlotIndex>,
}

/// The submission lifecycle manager.
///
/// Cloning is cheap — all clones share the same state.
pub struct LifecycleManager<P: SignatureProvider> {
  inner: Arc<Inner<P>>,
}

impl<P: SignatureProvider> Clone for LifecycleManager<P> {
  fn clone(&self) -> Self {
    Self { inner: Arc::clone(&self.inner) }
  }
}

impl<P> LifecycleManager<P>
where
  P: SignatureProvider + 'static,
{
  pub fn new(provider: P, timing: DeliveryTiming) -> Self {
    Self {
      inner: Arc::new(Inner {
        provider,
        timing,
        initialized: AtomicBool::new(false),
        templates: RwLock::new(Vec::new()),
        slots: Mutex::new(SlotIndex::default()),
      }),
    }
  }

  // ── Initialisation ────────────────────────────────────────────────────────

  /// Establish provider connectivity. Mutating operations fail with
  /// [`Error::NotInitialized`] until this has succeeded once.
  pub async fn initialize(&self) -> Result<()> {
    self
      .inner
      .provider
      .test_connection()
      .await
      .map_err(|e| Error::Provider(e.to_string()))?;
    self.inner.initialized.store(true, Ordering::SeqCst);
    Ok(())
  }

  /// Re-check provider connectivity without touching manager state.
  pub async fn test_connection(&self) -> Result<()> {
    self
      .inner
      .provider
      .test_connection()
      .await
      .map_err(|e| Error::Provider(e.to_string()))
  }

  fn ensure_initialized(&self) -> Result<()> {
    if self.inner.initialized.load(Ordering::SeqCst) {
      Ok(())
    } else {
      Err(Error::NotInitialized)
    }
  }

  // ── Templates ─────────────────────────────────────────────────────────────

  /// Wholesale-replace the template cache from the provider. All-or-nothing:
  /// a provider failure leaves the cache untouched.
  pub async fn sync_templates(&self) -> Result<usize> {
    self.ensure_initialized()?;

    let fetched = self
      .inner
      .provider
      .list_templates()
      .await
      .map_err(|e| Error::Provider(e.to_string()))?;

    let count = fetched.len();
    *self.inner.templates.write().expect("templates lock") = fetched;
    tracing::info!(count, "template cache synced");
    Ok(count)
  }

  pub fn templates(&self) -> Vec<Template> {
    self.inner.templates.read().expect("templates lock").clone()
  }

  /// Unknown ids are a `None`, not an error.
  pub fn template(&self, id: &str) -> Option<Template> {
    self
      .inner
      .templates
      .read()
      .expect("templates lock")
      .iter()
      .find(|t| t.id == id)
      .cloned()
  }

  // ── Creation ──────────────────────────────────────────────────────────────

  /// Create a submission against a synced template.
  ///
  /// Input is validated before any state mutation: an unknown template is
  /// [`Error::TemplateNotFound`], an empty submitter list is
  /// [`Error::Validation`]. Provider failures are reported synchronously.
  pub async fn create_submission(&self, new: NewSubmission) -> Result<Submission> {
    self.ensure_initialized()?;

    if new.submitters.is_empty() {
      return Err(Error::Validation(
        "a submission requires at least one submitter".into(),
      ));
    }
    let template = self
      .template(&new.template_id)
      .ok_or_else(|| Error::TemplateNotFound(new.template_id.clone()))?;

    let id = self
      .inner
      .provider
      .create_submission(&template, &new.submitters, new.message.as_deref())
      .await
      .map_err(|e| Error::Provider(e.to_string()))?;

    let submission = Submission {
      id:           id.clone(),
      template_id:  template.id.clone(),
      status:       SubmissionStatus::Pending,
      submitters:   new.submitters,
      created_at:   Utc::now(),
      sent_at:      None,
      completed_at: None,
      expires_at:   None,
      metadata:     new.metadata,
    };

    let slot = Arc::new(Slot {
      state: tokio::sync::Mutex::new(SlotState {
        submission: submission.clone(),
        epoch:      0,
        callback:   None,
      }),
    });

    {
      let mut index = self.inner.slots.lock().expect("slots lock");
      index.by_id.insert(id.clone(), slot);
      index.order.push(id.clone());
    }

    tracing::info!(submission_id = %id, template_id = %template.id, "submission created");

    if new.send_email {
      self.schedule_delivery(id, 0);
    }

    Ok(submission)
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  fn slot(&self, id: &str) -> Option<Arc<Slot>> {
    self.inner.slots.lock().expect("slots lock").by_id.get(id).cloned()
  }

  fn slot_or_not_found(&self, id: &str) -> Result<Arc<Slot>> {
    self.slot(id).ok_or_else(|| Error::SubmissionNotFound(id.to_string()))
  }

  /// Read-only snapshot, or `None` for an unknown id.
  pub async fn submission(&self, id: &str) -> Option<Submission> {
    let slot = self.slot(id)?;
    let state = slot.state.lock().await;
    Some(state.submission.clone())
  }

  /// All submissions whose `metadata.employee_id` matches, in creation order.
  pub async fn submissions_by_employee(&self, employee_id: &str) -> Vec<Submission> {
    let slots: Vec<Arc<Slot>> = {
      let index = self.inner.slots.lock().expect("slots lock");
      index
        .order
        .iter()
        .filter_map(|id| index.by_id.get(id).cloned())
        .collect()
    };

    let mut out = Vec::new();
    for slot in slots {
      let state = slot.state.lock().await;
      if state.submission.metadata.get("employee_id").map(String::as_str)
        == Some(employee_id)
      {
        out.push(state.submission.clone());
      }
    }
    out
  }

  // ── Transitions ───────────────────────────────────────────────────────────

  /// Mark a submission signed. Legal from `sent` or `opened` only; the
  /// submitted `values` are recorded on the first submitter entry.
  pub async fn complete_submission(
    &self,
    id: &str,
    values: Option<BTreeMap<String, serde_json::Value>>,
  ) -> Result<Submission> {
    self.ensure_initialized()?;
    let slot = self.slot_or_not_found(id)?;
    self
      .inner
      .transition(&slot, EventKind::Completed, values, "complete")
      .await
  }

  /// Expire a submission explicitly. Legal from `sent` or `opened`.
  pub async fn expire_submission(&self, id: &str) -> Result<Submission> {
    self.ensure_initialized()?;
    let slot = self.slot_or_not_found(id)?;
    self.inner.transition(&slot, EventKind::Expired, None, "expire").await
  }

  /// Record a recipient decline. Legal from any non-terminal state.
  pub async fn decline_submission(&self, id: &str) -> Result<Submission> {
    self.ensure_initialized()?;
    let slot = self.slot_or_not_found(id)?;
    self.inner.transition(&slot, EventKind::Declined, None, "decline").await
  }

  /// Re-invite the signer. Legal from `sent`, `opened`, or `expired`;
  /// resets `sent_at`, discards viewer progress, and restarts the simulated
  /// delivery chain.
  pub async fn resend_submission(&self, id: &str) -> Result<Submission> {
    self.ensure_initialized()?;
    let slot = self.slot_or_not_found(id)?;

    let (snapshot, epoch) = {
      let mut state = slot.state.lock().await;
      let from = state.submission.status;
      if !from.may_resend() {
        return Err(Error::InvalidTransition { from, action: "resend" });
      }

      state.epoch += 1;
      self.inner.apply(&mut state.submission, EventKind::Sent, None);
      let event = SubmissionEvent {
        event:      EventKind::Sent,
        submission: state.submission.clone(),
      };
      Inner::<P>::fire_callback(&state, &event);
      (state.submission.clone(), state.epoch)
    };

    tracing::info!(submission_id = %snapshot.id, "submission resent");
    self.schedule_delivery(snapshot.id.clone(), epoch);
    Ok(snapshot)
  }

  /// Webhook entry point: apply a provider-reported transition. The same
  /// legality rules apply as for caller-initiated transitions.
  pub async fn ingest_event(&self, id: &str, event: EventKind) -> Result<Submission> {
    self.ensure_initialized()?;
    let slot = self.slot_or_not_found(id)?;
    self.inner.transition(&slot, event, None, "ingest").await
  }

  // ── Callbacks ─────────────────────────────────────────────────────────────

  /// Register the single observer for `id`. The handler receives every
  /// subsequent transition event until the process ends; registration is
  /// in-memory only. A later registration replaces the earlier one.
  pub async fn register_callback<F>(&self, id: &str, handler: F) -> Result<()>
  where
    F: Fn(&SubmissionEvent) + Send + Sync + 'static,
  {
    let slot = self.slot_or_not_found(id)?;
    let mut state = slot.state.lock().await;
    state.callback = Some(Box::new(handler));
    Ok(())
  }

  // ── Documents ─────────────────────────────────────────────────────────────

  /// Fetch the signed document bundle. Only a `completed` submission has
  /// documents; any other state is [`Error::NotCompleted`].
  pub async fn download_documents(&self, id: &str) -> Result<StoredBlob> {
    self.ensure_initialized()?;
    let slot = self.slot_or_not_found(id)?;

    let snapshot = {
      let state = slot.state.lock().await;
      if state.submission.status != SubmissionStatus::Completed {
        return Err(Error::NotCompleted(id.to_string()));
      }
      state.submission.clone()
    };

    let template = self.template(&snapshot.template_id);
    self
      .inner
      .provider
      .fetch_completed_documents(&snapshot, template.as_ref())
      .await
      .map_err(|e| Error::Provider(e.to_string()))
  }

  // ── Simulated delivery ────────────────────────────────────────────────────

  /// Spawn the timer chain standing in for provider webhooks: `sent` after
  /// `send_delay`, `opened` after a further `open_delay`, and an optional
  /// expiry. Each step re-checks the epoch so explicit transitions preempt
  /// the chain.
  fn schedule_delivery(&self, id: String, epoch: u64) {
    let inner = Arc::clone(&self.inner);
    tokio::spawn(async move {
      tokio::time::sleep(inner.timing.send_delay).await;
      if !inner.apply_timer_event(&id, epoch, EventKind::Sent).await {
        // Resend re-enters here already in `sent`; fall through so the
        // opened/expiry steps still run for the current epoch.
        if !inner.is_current_sent(&id, epoch).await {
          return;
        }
      }

      if let Some(expires_in) = inner.timing.expires_in {
        let inner = Arc::clone(&inner);
        let id = id.clone();
        tokio::spawn(async move {
          tokio::time::sleep(expires_in).await;
          inner.apply_timer_event(&id, epoch, EventKind::Expired).await;
        });
      }

      tokio::time::sleep(inner.timing.open_delay).await;
      inner.apply_timer_event(&id, epoch, EventKind::Opened).await;
    });
  }
}

impl<P: SignatureProvider> Inner<P> {
  /// True when `event` is a legal transition out of `status`.
  fn is_legal(status: SubmissionStatus, event: EventKind) -> bool {
    match event {
      EventKind::Sent => status == SubmissionStatus::Pending,
      EventKind::Opened => status == SubmissionStatus::Sent,
      EventKind::Completed | EventKind::Expired => status.is_in_flight(),
      EventKind::Declined => status.may_decline(),
    }
  }

  /// Apply `event` to `submission`, stamping the relevant timestamps.
  /// Legality must have been checked by the caller.
  fn apply(
    &self,
    submission: &mut Submission,
    event: EventKind,
    values: Option<BTreeMap<String, serde_json::Value>>,
  ) {
    let now = Utc::now();
    match event {
      EventKind::Sent => {
        submission.status = SubmissionStatus::Sent;
        submission.sent_at = Some(now);
        submission.expires_at =
          self.timing.expires_in.and_then(|d| {
            chrono::Duration::from_std(d).ok().map(|d| now + d)
          });
        for submitter in &mut submission.submitters {
          submitter.sent_at = Some(now);
          // A (re)send is a fresh invitation: viewer progress is discarded.
          submitter.viewed_at = None;
          if submitter.completed_at.is_none() {
            submitter.values = None;
          }
        }
      }
      EventKind::Opened => {
        submission.status = SubmissionStatus::Opened;
        if let Some(first) = submission.submitters.first_mut() {
          first.viewed_at = Some(now);
        }
      }
      EventKind::Completed => {
        submission.status = SubmissionStatus::Completed;
        submission.completed_at = Some(now);
        if let Some(first) = submission.submitters.first_mut() {
          first.completed_at = Some(now);
          if let Some(values) = values {
            first.values.get_or_insert_with(BTreeMap::new).extend(values);
          }
        }
      }
      EventKind::Expired => submission.status = SubmissionStatus::Expired,
      EventKind::Declined => submission.status = SubmissionStatus::Declined,
    }
  }

  /// Serialized explicit transition: take the slot lock, check legality
  /// against the current state, apply, bump the epoch, notify.
  async fn transition(
    &self,
    slot: &Slot,
    event: EventKind,
    values: Option<BTreeMap<String, serde_json::Value>>,
    action: &'static str,
  ) -> Result<Submission> {
    let mut state = slot.state.lock().await;

    let from = state.submission.status;
    if !Self::is_legal(from, event) {
      return Err(Error::InvalidTransition { from, action });
    }

    state.epoch += 1;
    self.apply(&mut state.submission, event, values);

    let snapshot = state.submission.clone();
    tracing::debug!(
      submission_id = %snapshot.id,
      from = %from,
      to = %snapshot.status,
      "submission transition"
    );

    let payload = SubmissionEvent { event, submission: snapshot.clone() };
    Self::fire_callback(&state, &payload);

    Ok(snapshot)
  }

  /// Timer variant: silently discarded when the epoch is stale or the
  /// transition is no longer legal. Returns whether the event was applied.
  async fn apply_timer_event(
    self: &Arc<Self>,
    id: &str,
    epoch: u64,
    event: EventKind,
  ) -> bool {
    let slot = {
      let index = self.slots.lock().expect("slots lock");
      match index.by_id.get(id) {
        Some(slot) => Arc::clone(slot),
        None => return false,
      }
    };

    let mut state = slot.state.lock().await;
    if state.epoch != epoch || !Self::is_legal(state.submission.status, event) {
      return false;
    }

    self.apply(&mut state.submission, event, None);
    let payload = SubmissionEvent {
      event,
      submission: state.submission.clone(),
    };
    tracing::debug!(
      submission_id = %id,
      to = %state.submission.status,
      "simulated delivery event"
    );
    Self::fire_callback(&state, &payload);
    true
  }

  /// True when the slot is still on `epoch` and already `sent` — the resend
  /// re-entry case for the delivery chain.
  async fn is_current_sent(self: &Arc<Self>, id: &str, epoch: u64) -> bool {
    let slot = {
      let index = self.slots.lock().expect("slots lock");
      match index.by_id.get(id) {
        Some(slot) => Arc::clone(slot),
        None => return false,
      }
    };
    let state = slot.state.lock().await;
    state.epoch == epoch && state.submission.status == SubmissionStatus::Sent
  }

  /// Deliver an event to the registered handler, if any. A panicking handler
  /// is contained and logged; it never aborts the transition and cannot
  /// affect handlers registered for other submissions.
  fn fire_callback(state: &SlotState, event: &SubmissionEvent) {
    if let Some(cb) = &state.callback
      && catch_unwind(AssertUnwindSafe(|| cb(event))).is_err()
    {
      tracing::warn!(
        submission_id = %event.submission.id,
        event = ?event.event,
        "submission callback panicked; event dropped for this handler"
      );
    }
  }
}
