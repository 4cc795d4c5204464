/*!
Theme enum + resolution from the raw OS appearance preference.

The preference value is whatever the OS reports for `AppleInterfaceStyle`:
  - key absent   -> Light (macOS removes the key in light mode)
  - "Light"      -> Light
  - "Dark"       -> Dark
  - anything else is rejected; the event is dropped, the process keeps running.
*/

use std::fmt;

use crate::error::ThemeResolutionError;

/// Value assumed when the preference key is absent.
pub const DEFAULT_PREFERENCE: &str = "Light";

/// Desktop appearance mode.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Theme {
    Light,
    Dark,
}

impl Theme {
    /// Lowercase form understood by neovim's `background` option.
    pub fn as_background(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_background())
    }
}

/// Map a raw preference string to a validated `Theme`.
///
/// Matching is exact (case-sensitive), mirroring the values the OS writes.
pub fn resolve(raw: Option<&str>) -> Result<Theme, ThemeResolutionError> {
    match raw.unwrap_or(DEFAULT_PREFERENCE) {
        "Light" => Ok(Theme::Light),
        "Dark" => Ok(Theme::Dark),
        other => Err(ThemeResolutionError {
            raw: other.to_string(),
        }),
    }
}
