//! Storage cell through which a guarded call publishes its jump buffer.

use std::cell::Cell;
use std::fmt;
use std::ptr::{self, NonNull};

use crate::trigger;

/// Address of a jump buffer captured by a guarded call.
///
/// Only meaningful while that guarded call is still on the stack and the
/// buffer has not been resumed yet.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct JumpBufferHandle(NonNull<u8>);

impl JumpBufferHandle {
    /// Wrap a raw buffer address, `None` if it is null.
    ///
    /// # Safety
    ///
    /// `ptr` must have been published by a guarded call that is still armed.
    pub unsafe fn from_raw(ptr: *const u8) -> Option<Self> {
        NonNull::new(ptr.cast_mut()).map(Self)
    }

    /// Raw buffer address.
    pub fn as_ptr(self) -> *const u8 {
        self.0.as_ptr()
    }
}

impl fmt::Debug for JumpBufferHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JumpBufferHandle({:p})", self.0)
    }
}

/// One pointer-sized cell holding the currently armed jump buffer.
///
/// A slot belongs to a single thread (`EscapeSlot` is `!Sync`) and holds at
/// most one armed buffer. Nested guarded calls each need their own slot.
pub struct EscapeSlot {
    armed: Cell<*const u8>,
}

impl EscapeSlot {
    /// Create an empty slot.
    pub const fn new() -> Self {
        Self {
            armed: Cell::new(ptr::null()),
        }
    }

    /// Pointer handed to the native helper, which writes the buffer address.
    pub fn as_ptr(&self) -> *mut *const u8 {
        self.armed.as_ptr()
    }

    /// Currently armed buffer, if any.
    pub fn get(&self) -> Option<JumpBufferHandle> {
        unsafe { JumpBufferHandle::from_raw(self.armed.get()) }
    }

    /// Whether a guarded call has published a buffer here.
    pub fn is_armed(&self) -> bool {
        !self.armed.get().is_null()
    }

    /// Remove and return the armed buffer.
    pub fn take(&self) -> Option<JumpBufferHandle> {
        unsafe { JumpBufferHandle::from_raw(self.armed.replace(ptr::null())) }
    }

    pub(crate) fn clear(&self) {
        self.armed.set(ptr::null());
    }

    /// Resume the buffer armed in this slot.
    ///
    /// The slot is emptied first, so a second escape through it is caught
    /// instead of jumping into a dead frame.
    ///
    /// # Safety
    ///
    /// Same contract as [`trigger_escape`](crate::trigger_escape): must run on
    /// the thread whose guarded call armed the slot, while that call is live.
    pub unsafe fn escape(&self) -> ! {
        match self.take() {
            Some(handle) => unsafe { trigger::trigger_escape(handle) },
            None => trigger::contract_violation("escape through a slot with no armed jump buffer"),
        }
    }
}

impl Default for EscapeSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EscapeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EscapeSlot")
            .field("armed", &self.armed.get())
            .finish()
    }
}
