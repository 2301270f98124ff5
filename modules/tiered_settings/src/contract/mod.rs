//! Contract layer - public types shared by the store, the live holder and the admin API
//!
//! Everything here is transport-agnostic: no HTTP, no storage details.

pub mod dimension;
pub mod error;
pub mod model;
pub mod store;
pub mod value;

pub use dimension::Dimension;
pub use error::{DefinitionError, ErrorClass, SettingsError};
pub use model::{
    Coordinate, DefaultRule, ResolvedDefault, ResolvedSettings, ResolvedValue, SettingDefinition,
    SettingInfo, SettingValueOverride, SettingsGroup, ValueSource,
};
pub use store::{SettingsListener, SettingsStore, Subscription};
pub use value::{SettingValue, ValueKind};
