//! Identifier newtypes and helpers for validating identifiers used in filesystem paths.

use std::fmt;

use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::Xxh3;

/// Returns true if a savestate key is safe to use as a single path component on all platforms.
///
/// Rules:
/// - Must be non-empty and not "." or ".."
/// - Must not contain path separators ('/' or '\\')
/// - Must not contain control characters or NUL
/// - Must not contain Windows-reserved filename characters
/// - Must not end with '.' or space (Windows restriction)
pub fn is_safe_key(key: &str) -> bool {
    if key.is_empty() || key == "." || key == ".." {
        return false;
    }

    if key.ends_with('.') || key.ends_with(' ') {
        return false;
    }

    key.chars().all(|c| {
        !(c == '/' || c == '\\' || c == '\0' || c.is_control())
            && !matches!(c, ':' | '*' | '?' | '"' | '<' | '>' | '|')
    })
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Identity of an emulation core (e.g. `"game.libretro.nestopia"`).
    CoreId
);

string_id!(
    /// Reference to the resource (ROM, disc image, ...) a session plays.
    ResourceRef
);

string_id!(
    /// Identity of a physical input device, stable for as long as it stays connected.
    DeviceId
);

string_id!(
    /// Logical controller port address declared by the emulated program.
    PortId
);

string_id!(
    /// Storage key of a persisted savestate.
    ///
    /// Keys are generated by the store and are always filesystem-safe.
    SavestateKey
);

impl SavestateKey {
    /// Derive a fresh key from the producing resource, core and creation instant.
    ///
    /// `seq` disambiguates saves created within the same millisecond.
    pub fn generate(
        resource: Option<&ResourceRef>,
        core: &CoreId,
        timestamp_ms: i64,
        seq: u32,
    ) -> Self {
        let mut hasher = Xxh3::new();
        if let Some(resource) = resource {
            hasher.update(resource.as_str().as_bytes());
        }
        hasher.update(&[0]);
        hasher.update(core.as_str().as_bytes());
        hasher.update(&timestamp_ms.to_le_bytes());
        Self(format!("{:016x}-{:013x}-{:04x}", hasher.digest(), timestamp_ms, seq))
    }

    /// True if this key may be used as a file name.
    pub fn is_safe(&self) -> bool {
        is_safe_key(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_common_keys() {
        assert!(is_safe_key("save-with-dashes"));
        assert!(is_safe_key("save_with_underscores"));
        assert!(is_safe_key("save.with.dots"));
        assert!(is_safe_key("0123456789abcdef-0000000000001-0000"));
    }

    #[test]
    fn rejects_empty_and_special() {
        assert!(!is_safe_key(""));
        assert!(!is_safe_key("."));
        assert!(!is_safe_key(".."));
    }

    #[test]
    fn rejects_separators_and_reserved_chars() {
        assert!(!is_safe_key("../evil"));
        assert!(!is_safe_key("evil/dir"));
        assert!(!is_safe_key("evil\\dir"));
        assert!(!is_safe_key("C:evil"));
        assert!(!is_safe_key("bad|name"));
        assert!(!is_safe_key("bad?name"));
        assert!(!is_safe_key("bad\nname"));
    }

    #[test]
    fn rejects_trailing_dot_or_space() {
        assert!(!is_safe_key("bad."));
        assert!(!is_safe_key("bad "));
    }

    #[test]
    fn generated_keys_are_safe_and_distinct() {
        let core = CoreId::new("core.a");
        let resource = ResourceRef::new("/roms/game.nes");
        let a = SavestateKey::generate(Some(&resource), &core, 1_700_000_000_000, 0);
        let b = SavestateKey::generate(Some(&resource), &core, 1_700_000_000_000, 1);
        let c = SavestateKey::generate(None, &core, 1_700_000_000_000, 0);

        assert!(a.is_safe());
        assert!(c.is_safe());
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn ids_serialize_transparently() {
        let id = CoreId::new("core.b");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"core.b\"");
        let back: CoreId = serde_json::from_str("\"core.b\"").unwrap();
        assert_eq!(back, id);
    }
}
