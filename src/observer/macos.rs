//! Cocoa glue: observer class, distributed notification registration,
//! `NSUserDefaults` lookup and the application run loop.

use std::ffi::{CStr, CString, c_char, c_void};
use std::panic::AssertUnwindSafe;

use anyhow::{Result, anyhow, bail};
use objc::declare::ClassDecl;
use objc::runtime::{BOOL, Class, Object, Sel};
use objc::{class, msg_send, sel, sel_impl};

use super::{INTERFACE_STYLE_KEY, THEME_CHANGED_NOTIFICATION};
use crate::pipeline::Notifier;

#[link(name = "AppKit", kind = "framework")]
unsafe extern "C" {}

#[link(name = "Foundation", kind = "framework")]
unsafe extern "C" {}

const OBSERVER_CLASS: &str = "AppearanceNotifierObserver";
const NOTIFIER_IVAR: &str = "_notifier";

/// NSApplicationActivationPolicyProhibited: no Dock icon, no menu bar.
const ACTIVATION_POLICY_PROHIBITED: isize = 2;

/// Declare the observer class, attach `notifier` to a fresh instance and
/// register it with the distributed notification center.
///
/// Neither the instance nor the notifier is ever released.
pub(super) fn register(notifier: Notifier) -> Result<()> {
    let class = declare_observer_class()?;

    unsafe {
        let name = nsstring(THEME_CHANGED_NOTIFICATION)?;
        let observer: *mut Object = msg_send![class, new];
        if observer.is_null() {
            bail!("failed to instantiate {OBSERVER_CLASS}");
        }

        let context = Box::into_raw(Box::new(notifier)) as *mut c_void;
        (*observer).set_ivar::<*mut c_void>(NOTIFIER_IVAR, context);

        let center: *mut Object = msg_send![class!(NSDistributedNotificationCenter), defaultCenter];
        let _: () = msg_send![
            center,
            addObserver: observer
            selector: sel!(appearanceChanged:)
            name: name
            object: std::ptr::null::<Object>()
        ];
    }

    crate::log_debug!("registered observer for {THEME_CHANGED_NOTIFICATION}");
    Ok(())
}

/// Run the shared NSApplication as a background agent. Does not return.
pub(super) fn run_event_loop() {
    unsafe {
        let app: *mut Object = msg_send![class!(NSApplication), sharedApplication];
        let _: BOOL = msg_send![app, setActivationPolicy: ACTIVATION_POLICY_PROHIBITED];
        let _: () = msg_send![app, run];
    }
}

fn declare_observer_class() -> Result<&'static Class> {
    let superclass = class!(NSObject);
    let mut decl = ClassDecl::new(OBSERVER_CLASS, superclass)
        .ok_or_else(|| anyhow!("{OBSERVER_CLASS} is already registered"))?;

    decl.add_ivar::<*mut c_void>(NOTIFIER_IVAR);
    unsafe {
        decl.add_method(
            sel!(appearanceChanged:),
            appearance_changed as extern "C" fn(&Object, Sel, *mut Object),
        );
    }
    Ok(decl.register())
}

// Invoked by Cocoa on the main run loop. Panics must not cross the FFI
// boundary and autoreleased objects need a pool on this path.
extern "C" fn appearance_changed(this: &Object, _sel: Sel, _notification: *mut Object) {
    let result = std::panic::catch_unwind(AssertUnwindSafe(|| {
        objc::rc::autoreleasepool(|| unsafe { appearance_changed_inner(this) })
    }));
    if result.is_err() {
        crate::log_error!("appearance change handler panicked; waiting for the next change");
    }
}

/// # Safety
/// `this` must be an instance of the observer class set up by `register`.
unsafe fn appearance_changed_inner(this: &Object) {
    let context: *mut c_void = unsafe { *this.get_ivar::<*mut c_void>(NOTIFIER_IVAR) };
    if context.is_null() {
        return;
    }
    let notifier = unsafe { &*(context as *const Notifier) };
    let raw = unsafe { read_interface_style() };
    // Fire-and-forget: the wave's units keep running after it is dropped.
    let wave = notifier.handle_event(raw.as_deref());
    if !wave.is_empty() {
        crate::log_debug!("dispatched {} unit(s)", wave.len());
    }
}

/// `AppleInterfaceStyle` from the global defaults domain; `None` when unset.
unsafe fn read_interface_style() -> Option<String> {
    let key = nsstring(INTERFACE_STYLE_KEY).ok()?;
    unsafe {
        let defaults: *mut Object = msg_send![class!(NSUserDefaults), standardUserDefaults];
        let value: *mut Object = msg_send![defaults, stringForKey: key];
        string_from_nsstring(value)
    }
}

fn nsstring(s: &str) -> Result<*mut Object> {
    let cstr = CString::new(s)?;
    let ns: *mut Object =
        unsafe { msg_send![class!(NSString), stringWithUTF8String: cstr.as_ptr()] };
    if ns.is_null() {
        bail!("failed to create NSString for '{s}'");
    }
    Ok(ns)
}

unsafe fn string_from_nsstring(ns: *mut Object) -> Option<String> {
    if ns.is_null() {
        return None;
    }
    let utf8: *const c_char = unsafe { msg_send![ns, UTF8String] };
    if utf8.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(utf8) }
        .to_str()
        .ok()
        .map(str::to_string)
}
