//! Linking JIT images into the GDB JIT interface list.

use std::pin::Pin;
use std::ptr;

use otter_trap::jit_debug::{self, JitAction, JitCodeEntry, JitDebugDescriptor};
use parking_lot::Mutex;

use crate::JitDebugConfig;
use crate::error::{JitDebugError, JitDebugResult};

// Serializes every read and write of the descriptor's list.
static GDB_REGISTRATION: Mutex<()> = parking_lot::const_mutex(());

/// An in-memory object file registered with the GDB JIT interface.
///
/// The image stays visible to debuggers until this value is dropped.
pub struct GdbJitImageRegistration {
    entry: Pin<Box<JitCodeEntry>>,
    image: Pin<Box<[u8]>>,
}

impl GdbJitImageRegistration {
    /// Register `image` (an object file debuggers can load, typically ELF).
    pub fn register(image: Vec<u8>) -> JitDebugResult<Self> {
        if image.is_empty() {
            return Err(JitDebugError::EmptyImage);
        }

        let image = Pin::new(image.into_boxed_slice());
        let mut entry = Box::pin(JitCodeEntry {
            next_entry: ptr::null_mut(),
            prev_entry: ptr::null_mut(),
            symfile_addr: image.as_ptr(),
            symfile_size: image.len() as u64,
        });

        unsafe { register_entry(&mut *entry) };
        tracing::debug!(
            target: "otter::jit_debug",
            bytes = image.len(),
            "registered JIT image"
        );

        Ok(Self { entry, image })
    }

    /// Bytes of the registered object file.
    pub fn image(&self) -> &[u8] {
        &self.image
    }

    /// List node debuggers see for this image.
    pub fn entry(&self) -> *const JitCodeEntry {
        &*self.entry
    }
}

impl Drop for GdbJitImageRegistration {
    fn drop(&mut self) {
        unsafe { unregister_entry(&mut *self.entry) };
        tracing::trace!(
            target: "otter::jit_debug",
            bytes = self.image.len(),
            "unregistered JIT image"
        );
    }
}

impl std::fmt::Debug for GdbJitImageRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GdbJitImageRegistration")
            .field("entry", &self.entry())
            .field("bytes", &self.image.len())
            .finish()
    }
}

// SAFETY: the entry's links are only read or written while holding
// `GDB_REGISTRATION`, and the image is immutable once registered.
unsafe impl Send for GdbJitImageRegistration {}
unsafe impl Sync for GdbJitImageRegistration {}

/// Register `image` only when `OTTER_JIT_GDB` is enabled.
pub fn register_if_enabled(image: Vec<u8>) -> JitDebugResult<Option<GdbJitImageRegistration>> {
    register_with_config(crate::config(), image)
}

fn register_with_config(
    config: &JitDebugConfig,
    image: Vec<u8>,
) -> JitDebugResult<Option<GdbJitImageRegistration>> {
    if !config.enabled {
        return Ok(None);
    }
    GdbJitImageRegistration::register(image).map(Some)
}

/// Number of entries currently linked from the descriptor, including
/// entries registered by other runtimes sharing it.
pub fn live_entries() -> usize {
    let _guard = GDB_REGISTRATION.lock();
    let desc = jit_debug::descriptor().as_ptr();
    let mut count = 0;
    let mut cursor = unsafe { (*desc).first_entry };
    while !cursor.is_null() {
        count += 1;
        cursor = unsafe { (*cursor).next_entry };
    }
    count
}

/// Publish `action` on `entry` to an attached debugger, then clear it.
unsafe fn announce(desc: *mut JitDebugDescriptor, entry: *mut JitCodeEntry, action: JitAction) {
    unsafe {
        (*desc).relevant_entry = entry;
        (*desc).action_flag = action as u32;
        jit_debug::announce();
        (*desc).action_flag = JitAction::NoAction as u32;
        (*desc).relevant_entry = ptr::null_mut();
    }
}

unsafe fn register_entry(entry: *mut JitCodeEntry) {
    let _guard = GDB_REGISTRATION.lock();
    let desc = jit_debug::descriptor().as_ptr();
    unsafe {
        let head = (*desc).first_entry;
        (*entry).prev_entry = ptr::null_mut();
        (*entry).next_entry = head;
        if !head.is_null() {
            (*head).prev_entry = entry;
        }
        (*desc).first_entry = entry;
        announce(desc, entry, JitAction::Register);
    }
}

unsafe fn unregister_entry(entry: *mut JitCodeEntry) {
    let _guard = GDB_REGISTRATION.lock();
    let desc = jit_debug::descriptor().as_ptr();
    unsafe {
        let prev = (*entry).prev_entry;
        let next = (*entry).next_entry;
        if prev.is_null() {
            (*desc).first_entry = next;
        } else {
            (*prev).next_entry = next;
        }
        if !next.is_null() {
            (*next).prev_entry = prev;
        }
        announce(desc, entry, JitAction::Unregister);
        (*entry).next_entry = ptr::null_mut();
        (*entry).prev_entry = ptr::null_mut();
    }
}
