pub mod error;

pub use error::{ApiError, ApiResult};

use crate::application::services::{AddressProvisioner, HealthReducer, ValidationService};
use crate::application::services::AmazonPollingClassifier;

#[derive(Clone)]
pub struct AppState {
    pub provisioner: AddressProvisioner,
    pub validation_service: ValidationService,
    pub polling_classifier: AmazonPollingClassifier,
    pub health_reducer: HealthReducer,
}
