pub mod file_service;
pub mod observer;
pub mod power;
pub mod sample_sink;
pub mod sample_source;
