//! Age-based retention over the whole federation
//!
//! A purge pass computes one cutoff (`now - max_age`) and deletes, across
//! every writable store, observations whose phenomenon time is at or before
//! the cutoff and resources whose validity period ended by then. Resources
//! without a validity period are treated as valid for all time and are never
//! purged.
//!
//! Observations go first, then features, then systems, so a pass interrupted
//! mid-way never leaves an observation pointing at a purged system.
//!
//! [`PurgeRunner`] drives the policy from a background thread; passes are
//! single-flight, an overrunning pass makes the next tick a no-op instead of
//! piling up.

use crate::federated::FederatedDatabase;
use crate::registry::RegistryEvent;
use obshub_core::{
    CoreError, FeatureFilter, ObsFilter, Result, SystemFilter, TemporalFilter, TimeRange,
    Timestamp,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Retention settings carried by the federation configuration
#[derive(Debug, Clone)]
pub struct PurgeConfig {
    /// Records older than this are eligible for deletion
    pub max_age: Duration,
    /// Delay between purge passes
    pub period: Duration,
}

/// Outcome of one purge pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PurgeStats {
    /// Removed system descriptions
    pub systems: u64,
    /// Removed sampling features
    pub features: u64,
    /// Removed observations
    pub observations: u64,
    /// True when the pass was skipped because another was still running
    pub skipped: bool,
}

impl PurgeStats {
    /// The stats of a skipped pass
    pub fn skipped() -> Self {
        PurgeStats {
            skipped: true,
            ..PurgeStats::default()
        }
    }

    /// Total records removed
    pub fn total(&self) -> u64 {
        self.systems + self.features + self.observations
    }
}

/// Age-based deletion policy over a federated database
pub struct PurgePolicy {
    db: FederatedDatabase,
    max_age: Duration,
    running: AtomicBool,
}

impl PurgePolicy {
    /// Policy deleting records older than `max_age`
    pub fn new(db: FederatedDatabase, max_age: Duration) -> Self {
        PurgePolicy {
            db,
            max_age,
            running: AtomicBool::new(false),
        }
    }

    /// Run one purge pass unless one is already in flight
    pub fn tick(&self) -> Result<PurgeStats> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Ok(PurgeStats::skipped());
        }
        let result = self.run();
        self.running.store(false, Ordering::SeqCst);
        result
    }

    fn run(&self) -> Result<PurgeStats> {
        let cutoff = Timestamp::now().checked_sub(self.max_age).ok_or_else(|| {
            CoreError::InvalidArgument(format!(
                "max_age {:?} reaches before the epoch",
                self.max_age
            ))
        })?;
        let expired = TimeRange::new(Timestamp::EPOCH, cutoff)?;

        let observations = self.db.observations().remove_entries(
            &ObsFilter::builder().with_phenomenon_time(expired).build()?,
        )?;
        let features = self.db.features().remove_entries(
            &FeatureFilter::builder()
                .with_valid_time(TemporalFilter::within(expired))
                .build()?,
        )?;
        let systems = self.db.systems().remove_entries(
            &SystemFilter::builder()
                .with_valid_time(TemporalFilter::within(expired))
                .build()?,
        )?;

        let stats = PurgeStats {
            systems,
            features,
            observations,
            skipped: false,
        };
        if stats.total() > 0 {
            info!(observations, features, systems, "purge pass removed expired records");
            self.db.registry().publish(RegistryEvent::RecordsPurged {
                systems,
                features,
                observations,
            });
        } else {
            debug!(cutoff = %cutoff, "purge pass found nothing expired");
        }
        Ok(stats)
    }
}

/// Background thread running purge passes on a fixed period
///
/// The thread sleeps in short slices so shutdown is prompt even with a long
/// period. Dropping the runner also stops the thread.
pub struct PurgeRunner {
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl PurgeRunner {
    const SLICE: Duration = Duration::from_millis(100);

    /// Spawn the purge thread
    pub fn start(policy: Arc<PurgePolicy>, period: Duration) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let stop = Arc::clone(&shutdown);
        let handle = thread::Builder::new()
            .name("obshub-purge".to_string())
            .spawn(move || 'ticks: loop {
                let mut waited = Duration::ZERO;
                while waited < period {
                    if stop.load(Ordering::SeqCst) {
                        break 'ticks;
                    }
                    let nap = Self::SLICE.min(period - waited);
                    thread::sleep(nap);
                    waited += nap;
                }
                if stop.load(Ordering::SeqCst) {
                    break;
                }
                match policy.tick() {
                    Ok(_) => {}
                    Err(err) => warn!(error = %err, "purge pass failed"),
                }
            })
            .map(Some)
            .unwrap_or_else(|err| {
                warn!(error = %err, "could not spawn purge thread");
                None
            });
        PurgeRunner { shutdown, handle }
    }

    /// Whether the runner has been told to stop
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Stop the purge thread and wait for it to exit
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for PurgeRunner {
    fn drop(&mut self) {
        self.stop();
    }
}

impl FederatedDatabase {
    /// Start the background purge runner, if retention is configured
    pub fn start_purge(&self) -> Option<PurgeRunner> {
        let config = self.registry().purge_config()?;
        let policy = Arc::new(PurgePolicy::new(self.clone(), config.max_age));
        Some(PurgeRunner::start(policy, config.period))
    }
}
