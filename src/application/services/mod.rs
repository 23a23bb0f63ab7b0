pub mod address_provisioner;
pub mod health_reducer;
pub mod polling_classifier;
pub mod signal_probes;
pub mod validation_service;

pub use address_provisioner::AddressProvisioner;
pub use health_reducer::HealthReducer;
pub use polling_classifier::{AmazonPollingClassifier, PollingClassifierConfig};
pub use signal_probes::{ProbeConfig, SignalProbes};
pub use validation_service::ValidationService;
