pub mod client;
pub mod instance;
pub mod logmux;
pub mod probe;
pub mod scenario;
pub mod supervisor;

pub use client::McClient;
pub use instance::ServerInstance;
pub use logmux::{LogMux, Sink, Watch};
pub use probe::SidebandProbe;
pub use scenario::Scenario;
pub use supervisor::Supervisor;
