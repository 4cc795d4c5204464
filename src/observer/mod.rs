/*!
Appearance-change subscription.

`subscribe` registers exactly once for the OS appearance broadcast and hands
the `Notifier` to the observer, which keeps it until the process exits.
There is no unsubscribe: `Subscription` only moves forward
(Unregistered -> Registered) and `run_forever` never returns.

Only macOS broadcasts `AppleInterfaceThemeChangedNotification`; elsewhere
`subscribe` fails and the binary exits.
*/

#[cfg(target_os = "macos")]
mod macos;

use anyhow::Result;

use crate::pipeline::Notifier;
#[cfg(target_os = "macos")]
use crate::pipeline::report::Report;

/// Distributed notification posted when the system appearance flips.
pub const THEME_CHANGED_NOTIFICATION: &str = "AppleInterfaceThemeChangedNotification";

/// Global preference key holding "Dark" in dark mode (absent in light mode).
pub const INTERFACE_STYLE_KEY: &str = "AppleInterfaceStyle";

/// Proof that the observer is registered.
#[derive(Debug)]
pub struct Subscription {
    _registered: (),
}

impl Subscription {
    /// Hand the current thread to the platform event loop for good.
    pub fn run_forever(self) -> ! {
        #[cfg(target_os = "macos")]
        macos::run_event_loop();

        loop {
            std::thread::park();
        }
    }
}

/// Register `notifier` for appearance changes. Call once, from the main thread.
pub fn subscribe(notifier: Notifier) -> Result<Subscription> {
    #[cfg(target_os = "macos")]
    {
        notifier.reporter().report(&Report::Observing);
        macos::register(notifier)?;
        Ok(Subscription { _registered: () })
    }

    #[cfg(not(target_os = "macos"))]
    {
        drop(notifier);
        anyhow::bail!(
            "appearance change notifications ({THEME_CHANGED_NOTIFICATION}) are only available on macOS"
        )
    }
}
