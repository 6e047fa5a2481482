//! Alarm scheduling keyed by task identity
//!
//! Each [`TaskRef`] has at most one pending alarm. All timers live on one
//! dedicated thread driving a single-threaded tokio runtime; the pending map
//! is guarded by one mutex that every schedule, cancel and fire goes through.
//!
//! Per task the life cycle is `Unscheduled -> Pending -> (Fired | Cancelled)`,
//! and both end states remove the map entry. A firing timer removes its entry
//! *before* calling the handler and never holds the lock while doing so, so a
//! handler that snoozes by calling [`AlarmScheduler::schedule`] creates a
//! fresh pending alarm instead of racing the one that just fired.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread;
use std::time::Duration;

use chime_core::TaskRef;
use chime_core::date::{local_instant, parse_time_of_day};
use chrono::{DateTime, Local, NaiveDate, NaiveTime, Utc};
use tokio::runtime::{Builder, Handle};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::AlarmSettings;
use crate::error::{EngineError, Result};

/// Furthest relative offset accepted, about 8000 years
pub const MAX_RELATIVE_MINUTES: i64 = u32::MAX as i64;

/// Receives alarms as they fire
///
/// Called on the timer thread. Implementations that block (prompting a
/// user, say) should hand the alarm off to another thread; every other
/// alarm waits behind a blocked handler.
pub trait AlarmHandler: Send + Sync + 'static {
    fn on_alarm(&self, scheduler: &AlarmScheduler, alarm: FiredAlarm);
}

impl<F> AlarmHandler for F
where
    F: Fn(&AlarmScheduler, FiredAlarm) + Send + Sync + 'static,
{
    fn on_alarm(&self, scheduler: &AlarmScheduler, alarm: FiredAlarm) {
        self(scheduler, alarm)
    }
}

/// An alarm that has just fired and left the pending set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiredAlarm {
    pub task: TaskRef,
    /// Snooze length suggested to the user, as given when scheduling
    pub repeat_minutes: u32,
    /// Instant the alarm was due; earlier than now when scheduled in the past
    pub due_at: DateTime<Local>,
}

/// Point-in-time view of one pending alarm
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAlarm {
    pub task: TaskRef,
    pub fire_at: DateTime<Local>,
    pub repeat_minutes: u32,
}

struct Entry {
    id: u64,
    fire_at: DateTime<Local>,
    repeat_minutes: u32,
    timer: JoinHandle<()>,
}

struct Inner {
    pending: Mutex<HashMap<TaskRef, Entry>>,
    next_id: AtomicU64,
    handler: Box<dyn AlarmHandler>,
    runtime: Handle,
    // Dropping the sender lets the timer thread exit
    _shutdown: oneshot::Sender<()>,
}

impl Inner {
    fn pending(&self) -> MutexGuard<'_, HashMap<TaskRef, Entry>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let pending = self
            .pending
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        for (task, entry) in pending.drain() {
            debug!(%task, "discarding pending alarm on shutdown");
            entry.timer.abort();
        }
    }
}

/// Schedules one-shot alarms per task
///
/// Cheap to clone; all clones share the same pending set and timer thread.
/// The thread stops once the last clone is dropped, discarding anything
/// still pending.
#[derive(Clone)]
pub struct AlarmScheduler {
    inner: Arc<Inner>,
}

impl AlarmScheduler {
    /// Start the timer thread and register the fire handler
    pub fn new(settings: &AlarmSettings, handler: impl AlarmHandler) -> Result<Self> {
        let runtime = Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(|e| EngineError::runtime_with_source("failed to build timer runtime", e))?;
        let handle = runtime.handle().clone();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        thread::Builder::new()
            .name(settings.timer_thread_name.clone())
            .spawn(move || {
                // Resolves with an error once the scheduler is dropped
                let _ = runtime.block_on(shutdown_rx);
                debug!("alarm timer thread exiting");
            })
            .map_err(|e| EngineError::runtime_with_source("failed to spawn timer thread", e))?;

        Ok(Self {
            inner: Arc::new(Inner {
                pending: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                handler: Box::new(handler),
                runtime: handle,
                _shutdown: shutdown_tx,
            }),
        })
    }

    /// Schedule an alarm for `task` at `fire_at`, replacing any pending one
    ///
    /// An instant at or before now fires immediately.
    pub fn schedule(&self, task: TaskRef, fire_at: DateTime<Local>, repeat_minutes: u32) {
        let delay = (fire_at - Local::now()).to_std().unwrap_or(Duration::ZERO);
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);

        let mut pending = self.inner.pending();
        if let Some(previous) = pending.remove(&task) {
            previous.timer.abort();
            debug!(%task, replaced = %previous.fire_at, "replacing pending alarm");
        }

        let weak = Arc::downgrade(&self.inner);
        let key = task.clone();
        let timer = self.inner.runtime.spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            fire(weak, key, id);
        });

        info!(%task, %fire_at, delay_secs = delay.as_secs(), "alarm scheduled");
        pending.insert(
            task,
            Entry {
                id,
                fire_at,
                repeat_minutes,
                timer,
            },
        );
    }

    /// Schedule an alarm `minutes_from_now` minutes ahead
    ///
    /// The same number becomes the suggested repeat. Zero or negative
    /// minutes fire immediately; offsets past [`MAX_RELATIVE_MINUTES`] are
    /// saturated to it.
    pub fn schedule_relative(&self, task: TaskRef, minutes_from_now: i64) {
        let minutes = minutes_from_now.clamp(0, MAX_RELATIVE_MINUTES);
        let now = Local::now();
        let fire_at = now
            .checked_add_signed(chrono::Duration::minutes(minutes))
            .unwrap_or_else(|| DateTime::<Utc>::MAX_UTC.with_timezone(&Local));
        if minutes != minutes_from_now.max(0) {
            warn!(%task, requested = minutes_from_now, "relative alarm offset saturated");
        }
        let repeat = u32::try_from(minutes).unwrap_or(u32::MAX);
        self.schedule(task, fire_at, repeat);
    }

    /// Schedule on a calendar date at a time of day (start of day when absent)
    ///
    /// Returns the computed instant. An instant already in the past fires
    /// immediately. A local time that does not exist is rejected and leaves
    /// the pending set untouched.
    pub fn schedule_on(
        &self,
        task: TaskRef,
        date: NaiveDate,
        time_of_day: Option<NaiveTime>,
        repeat_minutes: u32,
    ) -> Result<DateTime<Local>> {
        let fire_at = local_instant(date, time_of_day)
            .map_err(|e| EngineError::schedule_with_source(format!("cannot alarm {}: {}", task, e), e))?;
        self.schedule(task, fire_at, repeat_minutes);
        Ok(fire_at)
    }

    /// [`schedule_on`](Self::schedule_on) with the time of day given as text
    ///
    /// A malformed time is rejected before anything is touched.
    pub fn schedule_at_daily_time(
        &self,
        task: TaskRef,
        date: NaiveDate,
        time_of_day: Option<&str>,
        repeat_minutes: u32,
    ) -> Result<DateTime<Local>> {
        let time = time_of_day
            .map(parse_time_of_day)
            .transpose()
            .map_err(|e| EngineError::schedule_with_source(format!("cannot alarm {}: {}", task, e), e))?;
        self.schedule_on(task, date, time, repeat_minutes)
    }

    /// Cancel the pending alarm for `task`. Returns whether one existed.
    pub fn cancel(&self, task: &TaskRef) -> bool {
        let removed = self.inner.pending().remove(task);
        match removed {
            Some(entry) => {
                entry.timer.abort();
                info!(%task, "alarm cancelled");
                true
            }
            None => false,
        }
    }

    /// Cancel everything pending. Returns how many alarms were cancelled.
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<_> = self.inner.pending().drain().collect();
        for (_, entry) in &drained {
            entry.timer.abort();
        }
        if !drained.is_empty() {
            info!(count = drained.len(), "all alarms cancelled");
        }
        drained.len()
    }

    /// Tasks that currently have a pending alarm
    pub fn snapshot(&self) -> Vec<TaskRef> {
        self.inner.pending().keys().cloned().collect()
    }

    /// Pending alarms with their fire times, soonest first
    pub fn pending(&self) -> Vec<PendingAlarm> {
        let mut alarms: Vec<_> = self
            .inner
            .pending()
            .iter()
            .map(|(task, entry)| PendingAlarm {
                task: task.clone(),
                fire_at: entry.fire_at,
                repeat_minutes: entry.repeat_minutes,
            })
            .collect();
        alarms.sort_by(|a, b| a.fire_at.cmp(&b.fire_at).then_with(|| a.task.cmp(&b.task)));
        alarms
    }

    pub fn is_pending(&self, task: &TaskRef) -> bool {
        self.inner.pending().contains_key(task)
    }

    pub fn next_fire(&self, task: &TaskRef) -> Option<DateTime<Local>> {
        self.inner.pending().get(task).map(|entry| entry.fire_at)
    }

    pub fn is_empty(&self) -> bool {
        self.inner.pending().is_empty()
    }
}

/// Timer body: claim the entry, then call the handler with the lock released
fn fire(inner: Weak<Inner>, task: TaskRef, id: u64) {
    let Some(inner) = inner.upgrade() else {
        return;
    };

    let alarm = {
        let mut pending = inner.pending();
        match pending.get(&task) {
            Some(entry) if entry.id == id => {}
            // Replaced or cancelled after this timer had already woken
            _ => return,
        }
        match pending.remove(&task) {
            Some(entry) => FiredAlarm {
                task,
                repeat_minutes: entry.repeat_minutes,
                due_at: entry.fire_at,
            },
            None => return,
        }
    };

    let late = (Local::now() - alarm.due_at).num_seconds();
    if late > 60 {
        warn!(task = %alarm.task, late_secs = late, "alarm fired late");
    }
    info!(task = %alarm.task, repeat_minutes = alarm.repeat_minutes, "alarm fired");

    let scheduler = AlarmScheduler { inner };
    scheduler.inner.handler.on_alarm(&scheduler, alarm);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::{self, Receiver};
    use std::time::Instant;

    fn task(name: &str) -> TaskRef {
        TaskRef::new(name, NaiveDate::from_ymd_opt(2026, 5, 1).unwrap())
    }

    fn recording_scheduler() -> (AlarmScheduler, Receiver<(Instant, FiredAlarm)>) {
        let (tx, rx) = mpsc::channel();
        let scheduler = AlarmScheduler::new(
            &AlarmSettings::default(),
            move |_: &AlarmScheduler, alarm: FiredAlarm| {
                let _ = tx.send((Instant::now(), alarm));
            },
        )
        .unwrap();
        (scheduler, rx)
    }

    fn in_millis(ms: i64) -> DateTime<Local> {
        Local::now() + chrono::Duration::milliseconds(ms)
    }

    #[test]
    fn test_relative_zero_fires_immediately_with_repeat() {
        let (scheduler, rx) = recording_scheduler();
        scheduler.schedule_relative(task("Report"), 0);

        let (_, alarm) = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(alarm.task, task("Report"));
        assert_eq!(alarm.repeat_minutes, 0);
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_past_instant_fires_immediately() {
        let (scheduler, rx) = recording_scheduler();
        scheduler.schedule(task("Late"), Local::now() - chrono::Duration::seconds(1), 15);

        let (_, alarm) = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(alarm.repeat_minutes, 15);
        assert!(alarm.due_at < Local::now());
    }

    #[test]
    fn test_schedule_fires_after_delay() {
        let (scheduler, rx) = recording_scheduler();
        let started = Instant::now();
        scheduler.schedule(task("Soon"), in_millis(150), 5);
        assert!(scheduler.is_pending(&task("Soon")));

        let (fired_at, _) = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(fired_at - started >= Duration::from_millis(140));
        assert!(!scheduler.is_pending(&task("Soon")));
    }

    #[test]
    fn test_reschedule_replaces_instead_of_stacking() {
        let (scheduler, rx) = recording_scheduler();
        let started = Instant::now();
        scheduler.schedule(task("Report"), in_millis(100), 1);
        scheduler.schedule(task("Report"), in_millis(300), 2);
        assert_eq!(scheduler.snapshot(), vec![task("Report")]);

        let (fired_at, alarm) = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(alarm.repeat_minutes, 2);
        assert!(fired_at - started >= Duration::from_millis(280));
        assert!(rx.recv_timeout(Duration::from_millis(300)).is_err());
    }

    #[test]
    fn test_cancel_suppresses_fire() {
        let (scheduler, rx) = recording_scheduler();
        scheduler.schedule(task("Gym"), in_millis(100), 0);
        assert!(scheduler.cancel(&task("Gym")));

        assert!(rx.recv_timeout(Duration::from_millis(300)).is_err());
        assert!(scheduler.snapshot().is_empty());
    }

    #[test]
    fn test_cancel_unknown_task_is_noop() {
        let (scheduler, _rx) = recording_scheduler();
        assert!(!scheduler.cancel(&task("Nothing")));
        scheduler.schedule(task("Other"), in_millis(60_000), 0);
        assert!(!scheduler.cancel(&task("Nothing")));
        assert_eq!(scheduler.snapshot().len(), 1);
    }

    #[test]
    fn test_at_most_one_pending_per_task() {
        let (scheduler, _rx) = recording_scheduler();
        for i in 0..20 {
            scheduler.schedule(task("A"), in_millis(60_000 + i), 0);
            if i % 3 == 0 {
                scheduler.cancel(&task("A"));
            }
            scheduler.schedule(task("B"), in_millis(60_000), 0);
        }

        let snapshot = scheduler.snapshot();
        assert_eq!(snapshot.iter().filter(|t| **t == task("A")).count(), 1);
        assert_eq!(snapshot.iter().filter(|t| **t == task("B")).count(), 1);
        assert_eq!(scheduler.cancel_all(), 2);
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_concurrent_schedules_keep_one_entry() {
        let (scheduler, _rx) = recording_scheduler();
        let workers: Vec<_> = (0..8)
            .map(|i| {
                let scheduler = scheduler.clone();
                thread::spawn(move || {
                    for j in 0..50 {
                        scheduler.schedule(task("Shared"), in_millis(60_000 + i * 100 + j), 0);
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }
        assert_eq!(scheduler.snapshot(), vec![task("Shared")]);
    }

    #[test]
    fn test_snooze_from_inside_handler() {
        let (tx, rx) = mpsc::channel();
        let scheduler = AlarmScheduler::new(
            &AlarmSettings::default(),
            move |scheduler: &AlarmScheduler, alarm: FiredAlarm| {
                // The fired entry is already gone when the handler runs
                let was_pending = scheduler.is_pending(&alarm.task);
                scheduler.schedule(
                    alarm.task.clone(),
                    Local::now() + chrono::Duration::minutes(30),
                    alarm.repeat_minutes,
                );
                let _ = tx.send(was_pending);
            },
        )
        .unwrap();

        scheduler.schedule_relative(task("Report"), 0);
        let was_pending = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert!(!was_pending);

        assert_eq!(scheduler.snapshot(), vec![task("Report")]);
        let pending = scheduler.pending();
        let expected = Local::now() + chrono::Duration::minutes(30);
        let drift = (pending[0].fire_at - expected).num_seconds().abs();
        assert!(drift <= 5, "fire_at off by {drift}s");
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
    }

    #[test]
    fn test_schedule_relative_future() {
        let (scheduler, rx) = recording_scheduler();
        scheduler.schedule_relative(task("Tea"), 45);

        let pending = scheduler.pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].repeat_minutes, 45);
        let minutes = (pending[0].fire_at - Local::now()).num_minutes();
        assert!((44..=45).contains(&minutes));
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn test_negative_relative_minutes_fire_immediately() {
        let (scheduler, rx) = recording_scheduler();
        scheduler.schedule_relative(task("Oops"), -10);
        let (_, alarm) = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(alarm.repeat_minutes, 0);
    }

    #[test]
    fn test_huge_relative_offset_saturates_instead_of_firing() {
        let (scheduler, rx) = recording_scheduler();
        scheduler.schedule_relative(task("Someday"), 200_000_000_000);
        scheduler.schedule_relative(task("Never"), i64::MAX);

        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
        for alarm in scheduler.pending() {
            assert_eq!(alarm.repeat_minutes, u32::MAX);
            assert!((alarm.fire_at - Local::now()).num_days() > 365 * 1000);
        }
        assert_eq!(scheduler.snapshot().len(), 2);
    }

    #[test]
    fn test_daily_time_in_past_fires_immediately() {
        let (scheduler, rx) = recording_scheduler();
        let yesterday = Local::now().date_naive() - chrono::Duration::days(1);

        let fire_at = scheduler
            .schedule_at_daily_time(task("Old"), yesterday, Some("9:00"), 30)
            .unwrap();
        assert_eq!(fire_at.date_naive(), yesterday);

        let (_, alarm) = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(alarm.repeat_minutes, 30);
    }

    #[test]
    fn test_daily_time_defaults_to_start_of_day() {
        let (scheduler, _rx) = recording_scheduler();
        let date = Local::now().date_naive() + chrono::Duration::days(3);

        let fire_at = scheduler.schedule_on(task("Trip"), date, None, 0).unwrap();
        assert_eq!(fire_at.date_naive(), date);
        assert_eq!(fire_at.time(), NaiveTime::MIN);
        assert_eq!(scheduler.next_fire(&task("Trip")), Some(fire_at));
    }

    #[test]
    fn test_malformed_time_leaves_state_unchanged() {
        let (scheduler, _rx) = recording_scheduler();
        let date = Local::now().date_naive() + chrono::Duration::days(1);
        let fire_at = scheduler.schedule_on(task("Keep"), date, None, 10).unwrap();

        let err = scheduler
            .schedule_at_daily_time(task("Keep"), date, Some("25:99"), 10)
            .unwrap_err();
        assert!(matches!(err, EngineError::Schedule { .. }));
        assert_eq!(scheduler.next_fire(&task("Keep")), Some(fire_at));
        assert_eq!(scheduler.snapshot().len(), 1);
    }

    #[test]
    fn test_pending_is_sorted_by_fire_time() {
        let (scheduler, _rx) = recording_scheduler();
        scheduler.schedule(task("later"), in_millis(120_000), 0);
        scheduler.schedule(task("sooner"), in_millis(60_000), 0);

        let names: Vec<_> = scheduler
            .pending()
            .into_iter()
            .map(|alarm| alarm.task.name().to_string())
            .collect();
        assert_eq!(names, ["sooner", "later"]);
    }

    #[test]
    fn test_dropping_scheduler_discards_pending() {
        let (scheduler, rx) = recording_scheduler();
        scheduler.schedule(task("Never"), in_millis(100), 0);
        drop(scheduler);
        assert!(rx.recv_timeout(Duration::from_millis(300)).is_err());
    }
}
