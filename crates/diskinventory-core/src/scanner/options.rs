/// Scan configuration and the optional delegate consulted during a scan.
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Options for one scan. All default to `false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanOptions {
    /// Measure allocated blocks instead of logical length.
    pub use_physical_size: bool,
    /// Descend into packages instead of measuring them as one leaf.
    pub look_into_packages: bool,
    /// Classify files by name only, ignoring the executable bit.
    pub ignore_creator_code: bool,
    /// Keep unreadable non-root folders as empty, flagged nodes instead of
    /// failing the scan.
    pub skip_unreadable: bool,
}

impl ScanOptions {
    /// Apply the delegate's overrides. Called once when a scan starts; the
    /// answers hold for every item of that scan.
    pub fn resolve(&self, delegate: &dyn ScanDelegate) -> ScanOptions {
        ScanOptions {
            use_physical_size: delegate.should_use_physical_size(self),
            look_into_packages: delegate.should_look_into_packages(self),
            ignore_creator_code: delegate.should_ignore_creator_code(self),
            skip_unreadable: self.skip_unreadable,
        }
    }
}

/// Hooks the surrounding application may supply to steer a scan.
///
/// Every method has a default, so implementors override only what they
/// need. Methods run on the scanner thread and must not block for long.
pub trait ScanDelegate: Send {
    /// Called before a folder's contents are read. Returning `false` stops
    /// the scan; it ends as cancelled.
    fn entering_folder(&mut self, _path: &Path) -> bool {
        true
    }

    /// Called after a folder's size has been finalised. Returning `false`
    /// stops the scan; it ends as cancelled.
    fn exiting_folder(&mut self, _path: &Path) -> bool {
        true
    }

    fn should_use_physical_size(&self, options: &ScanOptions) -> bool {
        options.use_physical_size
    }

    fn should_look_into_packages(&self, options: &ScanOptions) -> bool {
        options.look_into_packages
    }

    fn should_ignore_creator_code(&self, options: &ScanOptions) -> bool {
        options.ignore_creator_code
    }
}

/// Delegate that accepts every folder and keeps the configured options.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultDelegate;

impl ScanDelegate for DefaultDelegate {}

#[cfg(test)]
mod tests {
    use super::*;

    struct Physical;

    impl ScanDelegate for Physical {
        fn should_use_physical_size(&self, _options: &ScanOptions) -> bool {
            true
        }
    }

    #[test]
    fn default_delegate_keeps_options() {
        let options = ScanOptions {
            look_into_packages: true,
            ..ScanOptions::default()
        };
        assert_eq!(options.resolve(&DefaultDelegate), options);
    }

    #[test]
    fn delegate_overrides_only_what_it_implements() {
        let options = ScanOptions {
            ignore_creator_code: true,
            ..ScanOptions::default()
        };
        let resolved = options.resolve(&Physical);
        assert!(resolved.use_physical_size);
        assert!(resolved.ignore_creator_code);
        assert!(!resolved.look_into_packages);
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let options: ScanOptions = serde_json::from_str(r#"{"use_physical_size":true}"#).unwrap();
        assert!(options.use_physical_size);
        assert!(!options.skip_unreadable);
    }
}
