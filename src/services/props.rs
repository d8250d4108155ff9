//! Read-only system properties.

/// Set once the system has finished booting.
pub const BOOT_COMPLETED: &str = "sys.boot_completed";

/// Seconds to wait before starting a merge once it is allowed to start.
pub const MERGE_DELAY_SECONDS: &str = "ro.virtual_ab.merge_delay_seconds";

/// Set while a dynamic system update image is running.
pub const GSI_IMAGE_RUNNING: &str = "ro.gsid.image_running";

/// Build fingerprint of the running (target) build.
pub const BUILD_FINGERPRINT: &str = "ro.build.fingerprint";

/// Typed access to device properties.
///
/// Missing or unparsable properties yield the supplied default.
pub trait SystemProperties: Send + Sync {
    fn get_bool(&self, key: &str, default: bool) -> bool;

    fn get_i64(&self, key: &str, default: i64) -> i64;

    fn get_string(&self, key: &str, default: &str) -> String;
}
