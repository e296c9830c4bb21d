//! The per-device poll cycle: fetch, resolve, and write hub state.
//!
//! One [`WasteDevice`] exists per paired address. Every tick it runs the
//! strictly sequential fetch → normalize → resolve → write cycle against
//! the hub boundary traits. An atomic in-flight flag makes a slow cycle
//! skip the next tick instead of overlapping it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{Days, Local, NaiveDate, NaiveDateTime};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use hentedag_core::dates::format_long;
use hentedag_core::model::{AddressBinding, NextPickupSummary, WasteCategory};
use hentedag_core::resolve::resolve;
use hentedag_core::service::CalendarService;

use crate::platform::{CapabilityValue, HubDevice, PlatformError};
use crate::trigger::TriggerTime;

/// Capability holding the day count until the next pickup.
pub const DAYS_CAPABILITY: &str = "measure_next_waste_days_left";
/// Flow token carrying the joined category names.
pub const TYPES_TOKEN: &str = "next_waste_types";
/// Trigger card fired the evening before a pickup.
pub const TOMORROW_CARD: &str = "waste_pickup_tomorrow";
/// Settings key remembering the last fired (date, tie-set) pair.
pub const LAST_TRIGGER_KEY: &str = "last_trigger_key";
/// Placeholder written when the provider lists no upcoming pickups.
pub const NO_PICKUPS_PLACEHOLDER: &str = "Ingen kommende hentinger";

/// Capability id for one tracked category's next-pickup date.
#[must_use]
pub fn sensor_capability(category: WasteCategory) -> String {
    format!("sensor_waste_{}", category.slug())
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// User-adjustable device settings, re-applied without device recreation.
pub struct DeviceSettings {
    /// Categories shown as sensor capabilities.
    pub tracked: Vec<WasteCategory>,
    /// Earliest time of day at which the tomorrow trigger may fire.
    pub trigger_time: TriggerTime,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            tracked: WasteCategory::ALL.to_vec(),
            trigger_time: TriggerTime::default(),
        }
    }
}

/// One hub device bound to an address, owning its poll cycle.
pub struct WasteDevice {
    hub: Arc<dyn HubDevice>,
    service: Arc<CalendarService>,
    binding: AddressBinding,
    settings: Mutex<DeviceSettings>,
    in_flight: AtomicBool,
}

impl WasteDevice {
    /// Create a device for `binding`, writing into `hub`.
    #[must_use]
    pub fn new(
        hub: Arc<dyn HubDevice>,
        service: Arc<CalendarService>,
        binding: AddressBinding,
        settings: DeviceSettings,
    ) -> Self {
        Self {
            hub,
            service,
            binding,
            settings: Mutex::new(settings),
            in_flight: AtomicBool::new(false),
        }
    }

    /// The persisted address binding this device polls for.
    #[must_use]
    pub fn binding(&self) -> &AddressBinding {
        &self.binding
    }

    /// Apply new settings and reconcile the capability set with the
    /// tracked categories. Safe to call while the poller is running.
    ///
    /// # Errors
    ///
    /// Returns a [`PlatformError`] when the hub rejects a capability
    /// change.
    pub async fn apply_settings(&self, settings: DeviceSettings) -> Result<(), PlatformError> {
        if !self.hub.has_capability(DAYS_CAPABILITY).await {
            self.hub.add_capability(DAYS_CAPABILITY).await?;
        }
        for category in WasteCategory::ALL {
            let id = sensor_capability(category);
            let tracked = settings.tracked.contains(&category);
            let present = self.hub.has_capability(&id).await;
            if tracked && !present {
                self.hub.add_capability(&id).await?;
            } else if !tracked && present {
                self.hub.remove_capability(&id).await?;
            }
        }
        *self.settings.lock().unwrap_or_else(PoisonError::into_inner) = settings;
        Ok(())
    }

    /// Run one poll cycle unless the previous one is still in flight.
    pub async fn poll_once(&self) {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            warn!(address = %self.binding.raw_address, "previous poll cycle still running, skipping tick");
            return;
        }
        let result = self.run_cycle(Local::now().naive_local()).await;
        self.in_flight.store(false, Ordering::SeqCst);
        if let Err(error) = result {
            warn!(error = %error, "poll cycle could not write device state");
        }
    }

    /// Spawn the recurring poller. The first cycle runs immediately.
    #[must_use]
    pub fn spawn_poller(self: &Arc<Self>, every: Duration) -> PollerHandle {
        let device = Arc::clone(self);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                device.poll_once().await;
            }
        });
        PollerHandle { task }
    }

    /// Release hub resources on device deletion. The poller handle must be
    /// stopped separately by whoever owns it.
    pub async fn teardown(&self) {
        if let Err(error) = self.hub.unregister_token(TYPES_TOKEN).await {
            warn!(error = %error, "flow token could not be unregistered");
        }
    }

    async fn run_cycle(&self, now: NaiveDateTime) -> Result<(), PlatformError> {
        let snapshot = match self.service.fetch_calendar(&self.binding).await {
            Ok(snapshot) => snapshot,
            Err(error) => {
                // Transient: previous values stay on display, the next
                // tick retries.
                warn!(
                    provider = %self.binding.provider,
                    error = %error,
                    "calendar fetch failed, keeping previous values"
                );
                return Ok(());
            }
        };

        let settings = self.current_settings();
        let today = now.date();
        let summary = resolve(today, &snapshot.pickups);

        match summary {
            Some(summary) => {
                for category in &settings.tracked {
                    let value = snapshot
                        .pickups
                        .iter()
                        .find(|pickup| pickup.category == *category && pickup.date >= today)
                        .map_or(CapabilityValue::Empty, |pickup| {
                            CapabilityValue::Text(format_long(pickup.date))
                        });
                    self.write_if_present(&sensor_capability(*category), value)
                        .await?;
                }
                self.write_if_present(
                    DAYS_CAPABILITY,
                    CapabilityValue::Integer(summary.days_remaining),
                )
                .await?;
                if self.hub.has_capability(DAYS_CAPABILITY).await {
                    self.hub
                        .set_units(DAYS_CAPABILITY, &summary.units_label())
                        .await?;
                }
                self.hub.set_token(TYPES_TOKEN, &summary.display).await?;
                self.maybe_trigger(now, &summary, settings.trigger_time)
                    .await?;
                info!(
                    days = summary.days_remaining,
                    next = %summary.display,
                    "poll cycle complete"
                );
            }
            None => {
                // Distinct from a fetch failure: the provider answered and
                // knows of nothing upcoming, so show that instead of
                // stale dates.
                for category in &settings.tracked {
                    self.write_if_present(
                        &sensor_capability(*category),
                        CapabilityValue::Text(NO_PICKUPS_PLACEHOLDER.to_owned()),
                    )
                    .await?;
                }
                self.write_if_present(DAYS_CAPABILITY, CapabilityValue::Empty)
                    .await?;
                self.hub
                    .set_token(TYPES_TOKEN, NO_PICKUPS_PLACEHOLDER)
                    .await?;
                info!("no upcoming pickups known");
            }
        }
        Ok(())
    }

    async fn maybe_trigger(
        &self,
        now: NaiveDateTime,
        summary: &NextPickupSummary,
        trigger_time: TriggerTime,
    ) -> Result<(), PlatformError> {
        if summary.days_remaining != 1 || now.time() < trigger_time.as_naive_time() {
            return Ok(());
        }
        let Some(pickup_date) = now.date().checked_add_days(Days::new(1)) else {
            return Ok(());
        };
        let key = trigger_key(pickup_date, &summary.categories);
        if self.hub.get(LAST_TRIGGER_KEY).await.as_deref() == Some(key.as_str()) {
            debug!(key, "tomorrow trigger already fired");
            return Ok(());
        }
        self.hub
            .trigger(
                TOMORROW_CARD,
                &[("types".to_owned(), summary.display.clone())],
            )
            .await?;
        self.hub.set(LAST_TRIGGER_KEY, key).await?;
        info!(next = %summary.display, "tomorrow trigger fired");
        Ok(())
    }

    async fn write_if_present(
        &self,
        id: &str,
        value: CapabilityValue,
    ) -> Result<(), PlatformError> {
        if self.hub.has_capability(id).await {
            self.hub.set_value(id, value).await?;
        }
        Ok(())
    }

    fn current_settings(&self) -> DeviceSettings {
        self.settings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Dedup key for the tomorrow trigger: one firing per date and tie-set.
fn trigger_key(date: NaiveDate, categories: &[WasteCategory]) -> String {
    let slugs: Vec<&str> = categories.iter().map(|category| category.slug()).collect();
    format!("{date}:{}", slugs.join("+"))
}

/// Handle to a spawned poll task; aborting it stops further polling.
pub struct PollerHandle {
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Stop the poll loop. A cycle already in flight is cancelled at its
    /// next await point.
    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
