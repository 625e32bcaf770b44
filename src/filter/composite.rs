//! AND-composition of filters

use super::DeviceFilter;
use crate::devcache::Device;
use tracing::debug;

/// Combines child filters with AND semantics: a device passes only if every
/// child passes, evaluated in composition order and short-circuiting on the
/// first rejection. The rejecting child's name is recorded for diagnostics.
pub struct CompositeFilter {
    children: Vec<Box<dyn DeviceFilter>>,
}

impl CompositeFilter {
    pub fn new(children: Vec<Box<dyn DeviceFilter>>) -> Self {
        CompositeFilter { children }
    }
}

impl DeviceFilter for CompositeFilter {
    fn passes(&mut self, device: &Device) -> bool {
        for child in &mut self.children {
            if !child.passes(device) {
                debug!(
                    device = %device.path().display(),
                    filter = child.name(),
                    "device rejected"
                );
                return false;
            }
        }
        true
    }

    fn name(&self) -> &str {
        "composite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Stub filter that counts invocations and returns a fixed verdict.
    struct Counting {
        verdict: bool,
        calls: Rc<Cell<usize>>,
    }

    impl Counting {
        fn new(verdict: bool) -> (Self, Rc<Cell<usize>>) {
            let calls = Rc::new(Cell::new(0));
            (
                Counting {
                    verdict,
                    calls: Rc::clone(&calls),
                },
                calls,
            )
        }
    }

    impl DeviceFilter for Counting {
        fn passes(&mut self, _device: &Device) -> bool {
            self.calls.set(self.calls.get() + 1);
            self.verdict
        }
        fn name(&self) -> &str {
            "counting"
        }
    }

    fn dev() -> Device {
        Device::new("/dev/sda1", 8, 1)
    }

    #[test]
    fn test_all_pass() {
        let (a, a_calls) = Counting::new(true);
        let (b, b_calls) = Counting::new(true);
        let mut f = CompositeFilter::new(vec![Box::new(a), Box::new(b)]);

        assert!(f.passes(&dev()));
        assert_eq!(a_calls.get(), 1);
        assert_eq!(b_calls.get(), 1);
    }

    #[test]
    fn test_short_circuit_on_first_rejection() {
        let (a, a_calls) = Counting::new(false);
        let (b, b_calls) = Counting::new(true);
        let mut f = CompositeFilter::new(vec![Box::new(a), Box::new(b)]);

        assert!(!f.passes(&dev()));
        assert_eq!(a_calls.get(), 1);
        // the second child is never consulted
        assert_eq!(b_calls.get(), 0);
    }

    #[test]
    fn test_later_child_can_reject() {
        let (a, _) = Counting::new(true);
        let (b, _) = Counting::new(false);
        let mut f = CompositeFilter::new(vec![Box::new(a), Box::new(b)]);

        assert!(!f.passes(&dev()));
    }

    #[test]
    fn test_empty_composite_passes() {
        let mut f = CompositeFilter::new(Vec::new());
        assert!(f.passes(&dev()));
    }
}
