/// Generic resource record shared by every resource type.
///
/// A `Resource<D, N>` owns the creation descriptor `D` it was built from, its
/// lifecycle state and the backend's native object `N`. Only the device moves
/// a resource through its states; everything outside the device sees
/// read-only accessors.

/// Lifecycle of a resource record
///
/// Transitions are one-directional:
/// `Uncreated -> Initializing -> Live -> Destroying -> Destroyed`.
/// Only `Live` resources are visible through device handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceState {
    Uncreated,
    Initializing,
    Live,
    Destroying,
    Destroyed,
}

/// Descriptor + lifecycle state + native object
#[derive(Debug)]
pub struct Resource<D, N> {
    desc: D,
    state: ResourceState,
    native: Option<N>,
    debug_name: Option<String>,
}

impl<D, N> Resource<D, N> {
    /// Create an uncreated record holding `desc`
    pub fn new(desc: D) -> Self {
        Self {
            desc,
            state: ResourceState::Uncreated,
            native: None,
            debug_name: None,
        }
    }

    /// The immutable creation descriptor
    pub fn description(&self) -> &D {
        &self.desc
    }

    pub fn state(&self) -> ResourceState {
        self.state
    }

    /// Whether the native object exists and the resource can be used in commands
    pub fn is_initialized(&self) -> bool {
        self.state == ResourceState::Live && self.native.is_some()
    }

    /// Backend native object (present only while `Live`)
    pub fn native(&self) -> Option<&N> {
        self.native.as_ref()
    }

    pub fn debug_name(&self) -> Option<&str> {
        self.debug_name.as_deref()
    }

    // ===== DEVICE-ONLY TRANSITIONS =====

    pub(crate) fn begin_init(&mut self) {
        debug_assert_eq!(self.state, ResourceState::Uncreated);
        self.state = ResourceState::Initializing;
    }

    pub(crate) fn finish_init(&mut self, native: N) {
        debug_assert_eq!(self.state, ResourceState::Initializing);
        self.native = Some(native);
        self.state = ResourceState::Live;
    }

    /// Move to `Destroying` and hand the native object back for release
    pub(crate) fn begin_deinit(&mut self) -> Option<N> {
        debug_assert_eq!(self.state, ResourceState::Live);
        self.state = ResourceState::Destroying;
        self.native.take()
    }

    pub(crate) fn finish_deinit(&mut self) {
        debug_assert_eq!(self.state, ResourceState::Destroying);
        self.state = ResourceState::Destroyed;
    }

    pub(crate) fn set_debug_name(&mut self, name: &str) {
        self.debug_name = Some(name.to_string());
    }
}

#[cfg(test)]
#[path = "resource_tests.rs"]
mod tests;
