//! NUL-terminated UTF-16 strings for the wide-character native API.

use std::fmt;

use crate::error::NativeError;

/// A UTF-16 string with a trailing NUL, ready to be handed to a `PCWSTR` parameter.
///
/// Construction fails for strings with interior NULs, since the native side
/// would silently truncate them.
#[derive(Clone, PartialEq, Eq)]
pub struct WideString {
    text: String,
    units: Vec<u16>,
}

impl WideString {
    /// Convert `text` to its wide form.
    ///
    /// `what` names the argument in the error message (e.g. "distro name").
    pub fn new(text: &str, what: &str) -> Result<Self, NativeError> {
        if let Some(pos) = text.find('\0') {
            return Err(NativeError::Conversion {
                what: format!("{what} {text:?}"),
                reason: format!("contains a NUL character at byte {pos}"),
            });
        }

        let mut units: Vec<u16> = text.encode_utf16().collect();
        units.push(0);

        Ok(Self {
            text: text.to_owned(),
            units,
        })
    }

    /// The original UTF-8 text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// The UTF-16 code units including the trailing NUL.
    #[must_use]
    pub fn as_units(&self) -> &[u16] {
        &self.units
    }

    /// Pointer to the first code unit. Valid while `self` is alive.
    #[must_use]
    pub fn as_ptr(&self) -> *const u16 {
        self.units.as_ptr()
    }
}

impl fmt::Debug for WideString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.text, f)
    }
}

impl fmt::Display for WideString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
