//! NVS-backed record image.
//!
//! Implements [`NvStorage`] on top of a byte image the size of a small
//! FRAM.  Boards without the FRAM part (and the host simulation) keep
//! both status records here instead.
//!
//! - **`target_os = "espidf"`**: the image is mirrored into one NVS blob.
//!   Reads come from the RAM mirror; every write updates the mirror and
//!   commits the whole blob (NVS commits are atomic per `nvs_commit()`).
//! - **`not(target_os = "espidf")`**: the image lives in RAM only.

use log::info;
#[cfg(target_os = "espidf")]
use log::warn;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

use crate::app::ports::NvStorage;
use crate::error::StorageError;

#[cfg(target_os = "espidf")]
const NAMESPACE: &[u8] = b"trashpanda\0";
#[cfg(target_os = "espidf")]
const IMAGE_KEY: &[u8] = b"records\0";

/// Image size used when no FRAM is fitted; both records fit with room to grow.
pub const DEFAULT_IMAGE_LEN: usize = 512;

/// Byte image persisted as a single NVS blob.
pub struct NvsImageStorage {
    image: Vec<u8>,
}

impl NvsImageStorage {
    /// Initialise NVS flash and load the stored image.
    ///
    /// A missing or wrongly sized blob yields an erased (all-zero) image,
    /// which the record store treats as corrupt and reinitialises.
    pub fn new(capacity: usize) -> Result<Self, StorageError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: nvs_flash_init / nvs_flash_erase are called from the
            // single main-task context before any concurrent NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK || unsafe { nvs_flash_init() } != ESP_OK
                {
                    return Err(StorageError::IoError);
                }
            } else if ret != ESP_OK {
                return Err(StorageError::IoError);
            }

            let mut image = vec![0u8; capacity];
            match Self::with_nvs_handle(false, |handle| {
                let mut size = capacity;
                let ret = unsafe {
                    nvs_get_blob(
                        handle,
                        IMAGE_KEY.as_ptr() as *const _,
                        image.as_mut_ptr() as *mut _,
                        &mut size,
                    )
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(size)
            }) {
                Ok(size) if size == capacity => info!("NVS: {} byte record image loaded", size),
                Ok(size) => {
                    warn!("NVS: stored image is {} bytes, expected {}", size, capacity);
                    image.fill(0);
                }
                Err(ret) => {
                    info!("NVS: no record image yet ({})", ret);
                    image.fill(0);
                }
            }
            Ok(Self { image })
        }

        #[cfg(not(target_os = "espidf"))]
        {
            info!("NvsImageStorage: simulation backend, {} bytes", capacity);
            Ok(Self {
                image: vec![0u8; capacity],
            })
        }
    }

    /// Raw image, for diagnostics and tests.
    pub fn image(&self) -> &[u8] {
        &self.image
    }

    /// Mutable raw image; simulates media faults in tests.
    #[cfg(not(target_os = "espidf"))]
    pub fn image_mut(&mut self) -> &mut [u8] {
        &mut self.image
    }

    fn range(&self, offset: usize, len: usize) -> Result<core::ops::Range<usize>, StorageError> {
        match offset.checked_add(len) {
            Some(end) if end <= self.image.len() => Ok(offset..end),
            _ => Err(StorageError::OutOfBounds),
        }
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

        let ret = unsafe { nvs_open(NAMESPACE.as_ptr() as *const _, mode, &mut handle) };
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
    fn commit(&self) -> Result<(), StorageError> {
        Self::with_nvs_handle(true, |handle| {
            let ret = unsafe {
                nvs_set_blob(
                    handle,
                    IMAGE_KEY.as_ptr() as *const _,
                    self.image.as_ptr() as *const _,
                    self.image.len(),
                )
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            let ret = unsafe { nvs_commit(handle) };
            if ret != ESP_OK {
                return Err(ret);
            }
            Ok(())
        })
        .map_err(|ret| {
            warn!("NVS: commit failed ({})", ret);
            StorageError::IoError
        })
    }
}

impl NvStorage for NvsImageStorage {
    fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<(), StorageError> {
        let range = self.range(offset, buf.len())?;
        buf.copy_from_slice(&self.image[range]);
        Ok(())
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), StorageError> {
        let range = self.range(offset, data.len())?;
        self.image[range].copy_from_slice(data);

        #[cfg(target_os = "espidf")]
        self.commit()?;

        Ok(())
    }

    fn capacity(&self) -> usize {
        self.image.len()
    }
}
