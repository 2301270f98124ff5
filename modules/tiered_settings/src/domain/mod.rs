//! Domain layer - settings tree, materialization and live propagation

pub mod cache;
pub mod events;
pub mod factory;
pub mod live;
pub mod registry;
pub mod tree;
pub mod validation;

pub use cache::{GroupResolverCache, WatchedGroup};
pub use events::OverrideEvent;
pub use factory::SettingsFactory;
pub use live::{ChangeSignal, Generation, LiveSettings};
pub use registry::{SettingsRegistry, SettingsWithStore};
pub use tree::{GroupAccessor, GroupBuilder, GroupEntry, Setting, SettingsTree};
