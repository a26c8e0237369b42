pub mod config_dto;
pub mod session_dto;
