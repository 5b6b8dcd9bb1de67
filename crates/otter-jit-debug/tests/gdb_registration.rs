//! GDB JIT interface registration tests
//!
//! The descriptor list is process-global, so every test here runs serially.
//! On platforms with weak linkage this binary also supplies its own
//! `__jit_debug_register_code`, standing in for a debugger breakpoint: the
//! strong definition replaces the helper's weak one.

use std::ptr;

use otter_jit_debug::{GdbJitImageRegistration, JitDebugError, live_entries};
use otter_trap::jit_debug::{self, JitAction};
use serial_test::serial;

fn image(tag: u8) -> Vec<u8> {
    vec![0x7f, b'E', b'L', b'F', tag, tag, tag, tag]
}

fn head() -> *mut jit_debug::JitCodeEntry {
    unsafe { (*jit_debug::descriptor().as_ptr()).first_entry }
}

#[test]
#[serial]
fn registration_links_and_unlinks_entry() {
    let before = live_entries();
    let registration = GdbJitImageRegistration::register(image(1)).unwrap();

    assert_eq!(live_entries(), before + 1);
    assert_eq!(head().cast_const(), registration.entry());

    let entry = unsafe { &*registration.entry() };
    assert_eq!(entry.symfile_addr, registration.image().as_ptr());
    assert_eq!(entry.symfile_size, 8);
    assert!(entry.prev_entry.is_null());

    drop(registration);
    assert_eq!(live_entries(), before);
}

#[test]
#[serial]
fn descriptor_is_idle_between_announcements() {
    let registration = GdbJitImageRegistration::register(image(2)).unwrap();
    let desc = unsafe { &*jit_debug::descriptor().as_ptr() };
    assert_eq!(JitAction::from_raw(desc.action_flag), Some(JitAction::NoAction));
    assert!(desc.relevant_entry.is_null());
    assert_eq!(desc.version, jit_debug::JIT_DEBUG_VERSION);
    drop(registration);
    let desc = unsafe { &*jit_debug::descriptor().as_ptr() };
    assert_eq!(desc.action_flag, JitAction::NoAction as u32);
    assert!(desc.relevant_entry.is_null());
}

#[test]
#[serial]
fn newest_image_is_at_the_head() {
    let before = live_entries();
    let older = GdbJitImageRegistration::register(image(3)).unwrap();
    let newer = GdbJitImageRegistration::register(image(4)).unwrap();

    assert_eq!(head().cast_const(), newer.entry());
    unsafe {
        assert_eq!((*newer.entry()).next_entry.cast_const(), older.entry());
        assert_eq!((*older.entry()).prev_entry.cast_const(), newer.entry());
    }

    // Removing the tail keeps the head intact.
    drop(older);
    assert_eq!(head().cast_const(), newer.entry());
    assert_eq!(live_entries(), before + 1);
    unsafe {
        if before == 0 {
            assert!((*newer.entry()).next_entry.is_null());
        }
    }

    drop(newer);
    assert_eq!(live_entries(), before);
}

#[test]
#[serial]
fn removing_the_head_promotes_the_next_entry() {
    let older = GdbJitImageRegistration::register(image(5)).unwrap();
    let newer = GdbJitImageRegistration::register(image(6)).unwrap();

    drop(newer);
    assert_eq!(head().cast_const(), older.entry());
    assert!(unsafe { (*older.entry()).prev_entry.is_null() });
    drop(older);
}

#[test]
#[serial]
fn registrations_can_move_between_threads() {
    let before = live_entries();
    let registration = GdbJitImageRegistration::register(image(7)).unwrap();
    std::thread::spawn(move || drop(registration))
        .join()
        .unwrap();
    assert_eq!(live_entries(), before);
}

#[test]
fn empty_images_are_rejected() {
    assert_eq!(
        GdbJitImageRegistration::register(Vec::new()).unwrap_err(),
        JitDebugError::EmptyImage
    );
}

#[cfg(not(windows))]
mod debugger_hook {
    use super::*;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

    static CALLS: AtomicUsize = AtomicUsize::new(0);
    static LAST_ACTION: AtomicU32 = AtomicU32::new(0);
    static LAST_ENTRY: AtomicUsize = AtomicUsize::new(0);

    // Overrides the weak default from the helper library.
    #[unsafe(no_mangle)]
    pub extern "C" fn __jit_debug_register_code() {
        let desc = jit_debug::descriptor().as_ptr();
        unsafe {
            LAST_ACTION.store((*desc).action_flag, Ordering::SeqCst);
            LAST_ENTRY.store((*desc).relevant_entry as usize, Ordering::SeqCst);
        }
        CALLS.fetch_add(1, Ordering::SeqCst);
    }

    #[test]
    #[serial]
    fn debugger_sees_register_then_unregister() {
        let calls = CALLS.load(Ordering::SeqCst);
        let registration = GdbJitImageRegistration::register(image(8)).unwrap();
        let entry = registration.entry() as usize;

        assert_eq!(CALLS.load(Ordering::SeqCst), calls + 1);
        assert_eq!(LAST_ACTION.load(Ordering::SeqCst), JitAction::Register as u32);
        assert_eq!(LAST_ENTRY.load(Ordering::SeqCst), entry);

        drop(registration);
        assert_eq!(CALLS.load(Ordering::SeqCst), calls + 2);
        assert_eq!(LAST_ACTION.load(Ordering::SeqCst), JitAction::Unregister as u32);
        assert_eq!(LAST_ENTRY.load(Ordering::SeqCst), entry);
    }

    #[test]
    #[serial]
    fn announce_reaches_the_override() {
        let calls = CALLS.load(Ordering::SeqCst);
        jit_debug::announce();
        assert_eq!(CALLS.load(Ordering::SeqCst), calls + 1);
        assert_eq!(LAST_ENTRY.load(Ordering::SeqCst), ptr::null::<u8>() as usize);
    }
}
