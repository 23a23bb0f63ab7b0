pub mod dns_resolver;
pub mod inbound_repository;
pub mod oauth_repository;
pub mod policy_fetcher;
pub mod polling_job_repository;
pub mod store_health;
pub mod task_queue;
pub mod time_service;
