//! Task watchdog (TWDT) membership for one task.
//!
//! [`Watchdog::subscribe`] registers the calling FreeRTOS task, so it must
//! run on the thread that feeds.  Dropping the handle unsubscribes.  On the
//! host it only counts feeds.

use log::info;

pub struct Watchdog {
    task: &'static str,
    #[cfg(target_os = "espidf")]
    subscribed: bool,
    #[cfg(not(target_os = "espidf"))]
    feeds: core::cell::Cell<u32>,
}

impl Watchdog {
    /// Set the TWDT timeout (panic on expiry) and add the calling task.
    #[cfg(target_os = "espidf")]
    pub fn subscribe(task: &'static str, timeout_ms: u32) -> Self {
        use esp_idf_svc::sys::{ESP_OK, esp_task_wdt_add, esp_task_wdt_config_t, esp_task_wdt_reconfigure};

        let cfg = esp_task_wdt_config_t {
            timeout_ms,
            idle_core_mask: 0,
            trigger_panic: true,
        };
        // SAFETY: the config lives across the call; a null handle means
        // the calling task.
        let (reconfigured, added) =
            unsafe { (esp_task_wdt_reconfigure(&cfg), esp_task_wdt_add(core::ptr::null_mut())) };
        if reconfigured != ESP_OK {
            log::warn!("WDT | {task}: reconfigure returned {reconfigured}, keeping boot timeout");
        }
        let subscribed = added == ESP_OK;
        if subscribed {
            info!("WDT | {task} subscribed, {timeout_ms} ms");
        } else {
            log::warn!("WDT | {task}: subscribe failed ({added}), running unguarded");
        }
        Self { task, subscribed }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn subscribe(task: &'static str, timeout_ms: u32) -> Self {
        info!("WDT | {task}: host build, {timeout_ms} ms timeout not enforced");
        Self {
            task,
            feeds: core::cell::Cell::new(0),
        }
    }

    pub fn feed(&self) {
        #[cfg(target_os = "espidf")]
        if self.subscribed {
            // SAFETY: this task was added in `subscribe`.
            unsafe {
                esp_idf_svc::sys::esp_task_wdt_reset();
            }
        }
        #[cfg(not(target_os = "espidf"))]
        self.feeds.set(self.feeds.get().wrapping_add(1));
    }

    /// Feeds so far (host only).
    #[cfg(not(target_os = "espidf"))]
    pub fn feeds(&self) -> u32 {
        self.feeds.get()
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        #[cfg(target_os = "espidf")]
        if self.subscribed {
            // SAFETY: removes the task added in `subscribe`.
            let ret = unsafe { esp_idf_svc::sys::esp_task_wdt_delete(core::ptr::null_mut()) };
            if ret != esp_idf_svc::sys::ESP_OK {
                log::warn!("WDT | {}: unsubscribe failed ({ret})", self.task);
            }
        }
        #[cfg(not(target_os = "espidf"))]
        info!("WDT | {} released after {} feeds", self.task, self.feeds.get());
    }
}
