pub mod fixture_locks;

pub use fixture_locks::FixtureLocks;
