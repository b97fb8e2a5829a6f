//! Domain ports and supporting types for the hexagonal boundary.

mod macros;
pub(crate) use macros::define_port_error;

mod birthday_command;
mod birthday_query;
mod database_health_probe;
mod user_repository;

#[cfg(test)]
pub use birthday_command::MockBirthdayCommand;
pub use birthday_command::{BirthdayCommand, SaveOutcome};
#[cfg(test)]
pub use birthday_query::MockBirthdayQuery;
pub use birthday_query::BirthdayQuery;
#[cfg(test)]
pub use database_health_probe::MockDatabaseHealthProbe;
pub use database_health_probe::{DatabaseHealthProbe, FixtureDatabaseHealthProbe};
#[cfg(test)]
pub use user_repository::MockUserRepository;
pub use user_repository::{UserPersistenceError, UserRepository};
