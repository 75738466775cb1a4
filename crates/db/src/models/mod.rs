pub mod conversion_job;
pub mod pack;
pub mod status;
