pub mod clock;

pub use clock::SystemTimeService;
