pub mod config;
pub mod correlator;
pub mod population;
pub mod report;
pub mod runner;
pub mod scheduler;
pub mod stats;
pub mod transport;
pub mod wire;

pub use config::{Config, ConfigError};
pub use correlator::Correlator;
pub use population::{Population, SyntheticObject};
pub use runner::{RunError, RunReport};
pub use scheduler::{Policy, Scheduler};
pub use stats::{ResponseRecord, Summary};
pub use transport::{Channel, UdpChannel};
pub use wire::{LetheInfo, Response, Tier};
