pub mod centrifugo;
pub mod coefficient_service;
pub mod seed;
pub mod update_gateway;
pub mod user_service;

pub use centrifugo::{CentrifugoClient, CoefficientUpdateMessage, Notifier};
pub use coefficient_service::{CoefficientService, CoefficientUpdate};
pub use seed::seed_demo_data;
pub use update_gateway::{NotifyOutcome, UpdateGateway, UpdateReport, UpdateRequest};
pub use user_service::UserService;
