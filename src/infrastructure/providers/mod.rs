pub mod dns_resolver;
pub mod policy_fetcher;

pub use dns_resolver::HickoryTxtResolver;
pub use policy_fetcher::HttpPolicyFetcher;
