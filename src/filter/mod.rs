//! Device visibility filters
//!
//! A filter decides whether the rest of the tool is permitted to consider a
//! block device at all. Filters compose into a chain: regex (when configured)
//! and device-type checks under an AND composite, all wrapped by the
//! persistent layer that caches decisions on disk across invocations.

mod composite;
mod device_type;
mod persistent;
mod regex;

pub use self::composite::CompositeFilter;
pub use self::device_type::TypeFilter;
pub use self::persistent::PersistentFilter;
pub use self::regex::RegexFilter;

use crate::devcache::Device;

/// Predicate over a block device.
pub trait DeviceFilter {
    /// Decide whether the device is visible. Takes `&mut self` because the
    /// persistent layer records decisions as a side effect.
    fn passes(&mut self, device: &Device) -> bool;

    /// Short name used in rejection diagnostics.
    fn name(&self) -> &str;
}
