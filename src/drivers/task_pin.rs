//! FreeRTOS placement for `std` threads.
//!
//! ESP-IDF creates every `std::thread` through pthreads.  The attributes of
//! the next `pthread_create` on the calling thread come from a thread-local
//! config set with `esp_pthread_set_cfg`, so a [`TaskSpec`] is applied
//! immediately before the spawn and nothing else may spawn in between.
//! On the host only the name and stack size are honoured.

use std::io;
use std::thread::{Builder, JoinHandle};

use log::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Core {
    /// PRO_CPU: autotune, display and alerts.
    Pro = 0,
    /// APP_CPU: control and input.
    App = 1,
}

/// Where and how a task runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskSpec {
    /// Null-terminated; FreeRTOS keeps the pointer.
    pub name: &'static str,
    pub core: Core,
    pub priority: u8,
    pub stack_kb: usize,
}

impl TaskSpec {
    /// The name without its terminator.
    pub fn label(&self) -> &'static str {
        self.name.trim_end_matches('\0')
    }

    fn builder(&self) -> Builder {
        Builder::new()
            .name(self.label().to_owned())
            .stack_size(self.stack_kb * 1024)
    }
}

#[cfg(target_os = "espidf")]
pub fn spawn_pinned(spec: TaskSpec, f: impl FnOnce() + Send + 'static) -> io::Result<JoinHandle<()>> {
    use esp_idf_sys::{ESP_OK, esp_create_default_pthread_config, esp_pthread_set_cfg};

    // SAFETY: the config is copied by esp_pthread_set_cfg and the name is
    // a 'static terminated string.
    let ret = unsafe {
        let mut cfg = esp_create_default_pthread_config();
        cfg.pin_to_core = spec.core as i32;
        cfg.prio = i32::from(spec.priority);
        cfg.stack_size = (spec.stack_kb * 1024) as i32;
        cfg.thread_name = spec.name.as_ptr().cast();
        esp_pthread_set_cfg(&cfg)
    };
    if ret != ESP_OK as i32 {
        return Err(io::Error::other(format!(
            "{}: esp_pthread_set_cfg failed ({ret})",
            spec.label()
        )));
    }
    info!(
        "TASK | {} -> {:?} core, prio {}, {} KB",
        spec.label(),
        spec.core,
        spec.priority,
        spec.stack_kb
    );
    spec.builder().spawn(f)
}

#[cfg(not(target_os = "espidf"))]
pub fn spawn_pinned(spec: TaskSpec, f: impl FnOnce() + Send + 'static) -> io::Result<JoinHandle<()>> {
    info!("TASK | {} (host thread, {} KB)", spec.label(), spec.stack_kb);
    spec.builder().spawn(f)
}
