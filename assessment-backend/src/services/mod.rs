pub mod config_resolver;
pub mod generator;
pub mod grading_service;
pub mod sampler;
pub mod session_service;
pub mod test_config_service;
