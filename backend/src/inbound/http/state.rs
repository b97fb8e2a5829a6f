//! Shared HTTP adapter state.
//!
//! HTTP handlers accept this state via `actix_web::web::Data` so they only
//! depend on domain ports (use-cases) and remain testable without I/O.

use std::sync::Arc;

use chrono::NaiveDate;
use mockable::Clock;

use crate::domain::ports::{BirthdayCommand, BirthdayQuery};

/// Dependency bundle for the birthday handlers.
#[derive(Clone)]
pub struct HttpState {
    /// Save-or-update use case.
    pub birthdays: Arc<dyn BirthdayCommand>,
    /// Greeting lookup use case.
    pub greetings: Arc<dyn BirthdayQuery>,
    /// Source of "today" for request validation.
    pub clock: Arc<dyn Clock>,
}

impl HttpState {
    /// Construct state from port implementations.
    ///
    /// # Examples
    /// ```
    /// use std::sync::Arc;
    ///
    /// use birthday::domain::BirthdayService;
    /// use birthday::inbound::http::state::HttpState;
    /// # use async_trait::async_trait;
    /// # use birthday::domain::{BirthdayRecord, Username};
    /// # use birthday::domain::ports::{UserPersistenceError, UserRepository};
    /// # struct EmptyRepository;
    /// # #[async_trait]
    /// # impl UserRepository for EmptyRepository {
    /// #     async fn find_by_username(&self, _: &Username)
    /// #         -> Result<Option<BirthdayRecord>, UserPersistenceError> { Ok(None) }
    /// #     async fn create(&self, _: &BirthdayRecord) -> Result<(), UserPersistenceError> { Ok(()) }
    /// #     async fn update(&self, _: &BirthdayRecord) -> Result<bool, UserPersistenceError> { Ok(false) }
    /// # }
    ///
    /// let clock = Arc::new(mockable::DefaultClock);
    /// let service = Arc::new(BirthdayService::new(Arc::new(EmptyRepository), clock.clone()));
    /// let state = HttpState::new(service.clone(), service, clock);
    /// # let _ = state;
    /// ```
    pub fn new(
        birthdays: Arc<dyn BirthdayCommand>,
        greetings: Arc<dyn BirthdayQuery>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            birthdays,
            greetings,
            clock,
        }
    }

    /// Today's date in UTC, the reference for "date of birth in the past".
    pub fn today(&self) -> NaiveDate {
        self.clock.utc().date_naive()
    }
}
