#![doc = include_str!("../README.md")]

mod core;
mod dynamic;
mod environment;
mod handle;
pub mod raw;
pub mod routing;

pub use crate::core::{
    CoreBinary, GameDescriptor, GameGeometry, MAX_PLAYERS, PixelFormat, Region, SystemAvInfo,
    SystemInfo, SystemTiming, is_known_device,
};
pub use crate::dynamic::{CoreLoader, DynamicCore, DynamicLoader};
pub use crate::environment::{
    Environment, EnvironmentConfig, EnvironmentError, Frontend, InputDescriptor,
    KeyboardCallback, VariableDeclaration, VideoFrame,
};
pub use crate::handle::{ARCHIVE_EXTENSION, CoreCapabilities, CoreError, CoreHandle};
pub use crate::routing::{BindError, Binding, Callbacks};
