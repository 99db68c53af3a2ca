//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`SettingsStore`] for the per-channel setpoint and
//! calibration table, and persists the [`SystemConfig`] blob.
//!
//! Every value is a postcard-encoded blob under the `thermozone`
//! namespace:
//!
//! | Key        | Value                      |
//! |------------|----------------------------|
//! | `sp<i>`    | setpoint of channel *i*    |
//! | `cal<i>`   | calibration of channel *i* |
//! | `syscfg`   | `SystemConfig`             |
//!
//! On the host the backend is an in-memory map.

use log::{info, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::app::ports::SettingsStore;
use crate::config::SystemConfig;
use crate::error::StorageError;

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
const NAMESPACE: &[u8] = b"thermozone\0";
const CONFIG_KEY: &str = "syscfg";
/// NVS keys are at most 15 characters plus the terminator.
const KEY_CAPACITY: usize = 16;
/// Largest blob written or accepted on read.
const MAX_BLOB_SIZE: usize = 512;

type Key = heapless::String<KEY_CAPACITY>;

fn channel_key(prefix: &str, channel: usize) -> Key {
    let mut key = Key::new();
    if core::fmt::write(&mut key, format_args!("{prefix}{channel}")).is_err() {
        warn!("NVS: key {prefix}{channel} truncated to {key}");
    }
    key
}

pub struct NvsSettingsStore {
    #[cfg(not(target_os = "espidf"))]
    blobs: HashMap<String, Vec<u8>>,
}

impl NvsSettingsStore {
    /// Initialise NVS flash.
    ///
    /// On first boot or after a version mismatch the partition is erased
    /// and re-initialised.
    pub fn new() -> Result<Self, StorageError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: called once from the boot path before any task runs.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK || unsafe { nvs_flash_init() } != ESP_OK {
                    return Err(StorageError::Io);
                }
            } else if ret != ESP_OK {
                return Err(StorageError::Io);
            }
            info!("NvsSettingsStore: ESP-IDF NVS initialised");
            Ok(Self {})
        }

        #[cfg(not(target_os = "espidf"))]
        {
            info!("NvsSettingsStore: simulation backend");
            Ok(Self {
                blobs: HashMap::new(),
            })
        }
    }

    /// Stored configuration, or defaults when absent or unreadable.
    pub fn load_config(&self) -> SystemConfig {
        match self.read_value::<SystemConfig>(CONFIG_KEY) {
            Ok(cfg) => {
                info!("NvsSettingsStore: loaded config");
                cfg
            }
            Err(StorageError::NotFound) => {
                info!("NvsSettingsStore: no stored config, using defaults");
                SystemConfig::default()
            }
            Err(e) => {
                warn!("NvsSettingsStore: config unreadable ({e}), using defaults");
                SystemConfig::default()
            }
        }
    }

    /// Validate and persist `config`.
    pub fn save_config(&mut self, config: &SystemConfig) -> Result<(), crate::error::Error> {
        config.validate()?;
        self.write_value(CONFIG_KEY, config)?;
        info!("NvsSettingsStore: config saved");
        Ok(())
    }

    fn read_value<T: DeserializeOwned>(&self, key: &str) -> Result<T, StorageError> {
        let bytes = self.read_blob(key)?;
        postcard::from_bytes(&bytes).map_err(|_| StorageError::Corrupted)
    }

    fn write_value<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), StorageError> {
        let bytes = postcard::to_allocvec(value).map_err(|_| StorageError::Corrupted)?;
        if bytes.len() > MAX_BLOB_SIZE {
            warn!("NVS: {key} is {} bytes, limit {MAX_BLOB_SIZE}", bytes.len());
            return Err(StorageError::Io);
        }
        self.write_blob(key, &bytes)
    }

    // -----------------------------------------------------------------------
    // Backends
    // -----------------------------------------------------------------------

    #[cfg(not(target_os = "espidf"))]
    fn read_blob(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        self.blobs.get(key).cloned().ok_or(StorageError::NotFound)
    }

    #[cfg(not(target_os = "espidf"))]
    fn write_blob(&mut self, key: &str, data: &[u8]) -> Result<(), StorageError> {
        if key.len() >= KEY_CAPACITY {
            return Err(StorageError::Io);
        }
        self.blobs.insert(key.to_owned(), data.to_vec());
        Ok(())
    }

    /// Open the namespace, execute a closure with the handle, then close.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<F, T>(write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };

        // SAFETY: NAMESPACE is null-terminated; handle is closed below.
        let ret = unsafe { nvs_open(NAMESPACE.as_ptr().cast(), mode, &mut handle) };
        if ret != ESP_OK {
            return Err(ret);
        }

        let result = f(handle);
        unsafe {
            nvs_close(handle);
        }
        result
    }

    #[cfg(target_os = "espidf")]
    fn c_key(key: &str) -> [u8; KEY_CAPACITY] {
        let mut buf = [0u8; KEY_CAPACITY];
        let kb = key.as_bytes();
        let kl = kb.len().min(KEY_CAPACITY - 1);
        buf[..kl].copy_from_slice(&kb[..kl]);
        buf
    }

    #[cfg(target_os = "espidf")]
    fn read_blob(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let key_buf = Self::c_key(key);
        let result = Self::with_nvs_handle(false, |handle| {
            let mut size: usize = 0;
            // SAFETY: size query with a null buffer.
            let ret = unsafe {
                nvs_get_blob(handle, key_buf.as_ptr().cast(), core::ptr::null_mut(), &mut size)
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            if size == 0 || size > MAX_BLOB_SIZE {
                return Err(ESP_ERR_NVS_INVALID_LENGTH);
            }
            let mut buf = vec![0u8; size];
            // SAFETY: buf holds exactly `size` bytes.
            let ret = unsafe {
                nvs_get_blob(handle, key_buf.as_ptr().cast(), buf.as_mut_ptr().cast(), &mut size)
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            Ok(buf)
        });
        match result {
            Ok(buf) => Ok(buf),
            Err(e) if e == ESP_ERR_NVS_NOT_FOUND => Err(StorageError::NotFound),
            Err(e) if e == ESP_ERR_NVS_INVALID_LENGTH => Err(StorageError::Corrupted),
            Err(e) => {
                warn!("NVS: read {key} failed ({e})");
                Err(StorageError::Io)
            }
        }
    }

    #[cfg(target_os = "espidf")]
    fn write_blob(&mut self, key: &str, data: &[u8]) -> Result<(), StorageError> {
        let key_buf = Self::c_key(key);
        let result = Self::with_nvs_handle(true, |handle| {
            // SAFETY: data is a valid slice for the duration of the call.
            let ret = unsafe {
                nvs_set_blob(handle, key_buf.as_ptr().cast(), data.as_ptr().cast(), data.len())
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            let ret = unsafe { nvs_commit(handle) };
            if ret != ESP_OK {
                return Err(ret);
            }
            Ok(())
        });
        result.map_err(|e| {
            warn!("NVS: write {key} failed ({e})");
            StorageError::Io
        })
    }
}

impl SettingsStore for NvsSettingsStore {
    fn load_setpoint(&self, channel: usize) -> Result<f32, StorageError> {
        self.read_value(&channel_key("sp", channel))
    }

    fn load_calibration(&self, channel: usize) -> Result<f32, StorageError> {
        self.read_value(&channel_key("cal", channel))
    }

    fn save_setpoint(&mut self, channel: usize, value: f32) -> Result<(), StorageError> {
        self.write_value(&channel_key("sp", channel), &value)
    }

    fn save_calibration(&mut self, channel: usize, value: f32) -> Result<(), StorageError> {
        self.write_value(&channel_key("cal", channel), &value)
    }
}
