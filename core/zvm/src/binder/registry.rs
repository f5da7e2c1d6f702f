//! Windows registry storage for the persisted `Path` variable.
//!
//! The value keeps its registry type across rewrites. The machine `Path` is
//! normally `REG_EXPAND_SZ` with entries such as `%SystemRoot%\system32`,
//! and storing it back as `REG_SZ` would stop those entries from expanding.

use std::io::ErrorKind;

use tracing::debug;
use winreg::enums::{
    HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE, KEY_READ, KEY_SET_VALUE, RegType,
};
use winreg::{RegKey, RegValue};

use super::{PathScope, PathVariable};
use crate::errors::{Result, ZvmError};

const USER_KEY: &str = "Environment";
const MACHINE_KEY: &str = r"SYSTEM\CurrentControlSet\Control\Session Manager\Environment";
const VALUE_NAME: &str = "Path";

/// [`PathVariable`] backed by the user and machine environment keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegistryPathVariable;

impl RegistryPathVariable {
    fn key(scope: PathScope) -> (RegKey, &'static str) {
        match scope {
            PathScope::User => (RegKey::predef(HKEY_CURRENT_USER), USER_KEY),
            PathScope::Machine => (RegKey::predef(HKEY_LOCAL_MACHINE), MACHINE_KEY),
        }
    }
}

impl PathVariable for RegistryPathVariable {
    fn read(&self, scope: PathScope) -> Result<String> {
        let (hive, subkey) = Self::key(scope);
        let env = hive
            .open_subkey_with_flags(subkey, KEY_READ)
            .map_err(|e| map_io(scope, "open", e))?;
        match env.get_raw_value(VALUE_NAME) {
            Ok(raw) => Ok(decode_string(&raw.bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(map_io(scope, "read", e)),
        }
    }

    fn write(&self, scope: PathScope, value: &str) -> Result<()> {
        let (hive, subkey) = Self::key(scope);
        let env = hive
            .open_subkey_with_flags(subkey, KEY_READ | KEY_SET_VALUE)
            .map_err(|e| map_io(scope, "open", e))?;
        let existing = match env.get_raw_value(VALUE_NAME) {
            Ok(raw) => Some(raw.vtype),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return Err(map_io(scope, "read", e)),
        };
        let vtype = value_type_for(existing, value);
        debug!(%scope, ?vtype, "writing registry Path");
        let raw = RegValue {
            bytes: encode_string(value).into(),
            vtype,
        };
        env.set_raw_value(VALUE_NAME, &raw)
            .map_err(|e| map_io(scope, "write", e))?;
        broadcast_environment_change();
        Ok(())
    }

    fn location(&self, scope: PathScope) -> String {
        match scope {
            PathScope::User => format!(r"HKCU\{USER_KEY}\{VALUE_NAME}"),
            PathScope::Machine => format!(r"HKLM\{MACHINE_KEY}\{VALUE_NAME}"),
        }
    }

    fn activation_hint(&self, _scope: PathScope) -> Option<String> {
        Some("Open a new terminal to use the updated PATH".to_string())
    }
}

/// Picks the registry type for a new `Path` value.
///
/// An existing `REG_SZ` stays `REG_SZ` unless the new value references a
/// variable. Anything else, including a missing value, is written as
/// `REG_EXPAND_SZ` like the value Windows creates.
fn value_type_for(existing: Option<RegType>, value: &str) -> RegType {
    match existing {
        Some(RegType::REG_SZ) if !value.contains('%') => RegType::REG_SZ,
        _ => RegType::REG_EXPAND_SZ,
    }
}

/// Encodes a string as NUL-terminated little-endian UTF-16.
fn encode_string(value: &str) -> Vec<u8> {
    value
        .encode_utf16()
        .chain(std::iter::once(0))
        .flat_map(u16::to_le_bytes)
        .collect()
}

/// Decodes little-endian UTF-16 registry data, dropping trailing NULs.
fn decode_string(bytes: &[u8]) -> String {
    let mut units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    while units.last() == Some(&0) {
        units.pop();
    }
    String::from_utf16_lossy(&units)
}

fn map_io(scope: PathScope, action: &str, err: std::io::Error) -> ZvmError {
    if err.kind() == ErrorKind::PermissionDenied {
        ZvmError::Privilege {
            scope,
            message: format!("cannot {action} the {scope} environment registry key"),
        }
    } else {
        ZvmError::io(format!("failed to {action} the {scope} environment registry key"), err)
    }
}

/// Tells running applications (Explorer in particular) to reload the
/// environment so newly started terminals see the change.
fn broadcast_environment_change() {
    use windows_sys::Win32::UI::WindowsAndMessaging::{
        HWND_BROADCAST, SMTO_ABORTIFHUNG, SendMessageTimeoutW, WM_SETTINGCHANGE,
    };

    let area: Vec<u16> = "Environment".encode_utf16().chain(std::iter::once(0)).collect();
    let mut result = 0usize;
    // SAFETY: `area` is a NUL-terminated UTF-16 string that outlives the call,
    // and `result` is a valid out pointer.
    let sent = unsafe {
        SendMessageTimeoutW(
            HWND_BROADCAST,
            WM_SETTINGCHANGE,
            0,
            area.as_ptr() as isize,
            SMTO_ABORTIFHUNG,
            5000,
            &raw mut result,
        )
    };
    if sent == 0 {
        debug!("environment change broadcast timed out");
    }
}
