// Domain layer: catalog models, routing decisions and ports (interfaces).

pub mod model;
pub mod ports;
