use thiserror::Error;
use tuner_core::Report;

/// Ways the optimizer can misuse report registration.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RegisterError {
    #[error("report has already been registered")]
    ReportAlreadyRegistered,

    #[error("report is empty")]
    EmptyReport,
}

/// Single-assignment slot for the optimizer's final report.
///
/// The first successful registration wins; later attempts are rejected
/// without touching the stored report.
#[derive(Debug, Clone, Default)]
pub struct ReportRegistry {
    slot: Option<Report>,
}

impl ReportRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `report` unless one is already stored.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::ReportAlreadyRegistered`] on a second call and
    /// [`RegisterError::EmptyReport`] if `report` is `None`.
    pub fn register(&mut self, report: Option<Report>) -> Result<(), RegisterError> {
        if self.slot.is_some() {
            return Err(RegisterError::ReportAlreadyRegistered);
        }

        let report = report.ok_or(RegisterError::EmptyReport)?;
        self.slot = Some(report);
        Ok(())
    }

    #[must_use]
    pub fn get(&self) -> Option<&Report> {
        self.slot.as_ref()
    }

    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.slot.is_some()
    }

    /// Moves the report out, leaving the slot empty.
    pub fn take(&mut self) -> Option<Report> {
        self.slot.take()
    }
}
