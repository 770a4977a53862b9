//! Configuration: model parameters, solver options, and protocols.

pub mod options;
pub mod parameters;
pub mod protocol;

pub use options::Options;
pub use parameters::{
    AccessoryParameters, ExtracellularParameters, ForceScalingParameters, IsotypeDefinition,
    LatticeParameters, ModelParameters, ThickParameters, ThinParameters, TitinParameters,
};
pub use protocol::{pca_to_molar, ControlMode, Protocol, ProtocolStep};
