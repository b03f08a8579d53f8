//! Per-filter focuser calibration: CALCULATE, READ and RESET modes.

pub use reference::*;
pub use settings::*;
pub use store::*;

mod calculate;
mod read;
mod reference;
mod reset;
mod settings;
mod store;

use crate::config::Config;
use crate::positioning::{
    move_to, FocuserAxis, MoveError, MoveLimits, MoveOutcome, WheelAxis,
};
use crate::rpc::{Ccdciel, RemoteControl, RpcError, SessionLog};
use crate::util::{AppVersion, Clock, ExitStatus};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CalibrationError {
    #[error("focuser not connected")]
    FocuserDisconnected,

    #[error("filter wheel not connected")]
    WheelDisconnected,

    #[error("the filter wheel reports no filters")]
    NoFilters,

    #[error("focuser is at 0 and no stored position for {filter}, set the focuser near focus and rerun with -f <position>")]
    UnseededAutofocus { filter: String },

    #[error("no stored focuser position for {filter}: {status}")]
    MissingCalibration { filter: String, status: ReadStatus },

    #[error(transparent)]
    Move(#[from] MoveError),

    #[error(transparent)]
    Rpc(#[from] RpcError),
}

pub type CalibrationResult<T> = Result<T, CalibrationError>;

/// Calibration of one wheel slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotCalibration {
    pub slot: u32,
    pub filter: String,
    pub record: CalibrationRecord,
    /// The slot could not be selected; the record holds the focuser position of the time
    pub failed: bool,
}

/// Where the focuser ended up after selecting a filter
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FinalFocus {
    Stored(i64),
    UsedCurrentPosition(i64),
}

pub struct Calibrator<'a, R> {
    app: &'a Ccdciel<R>,
    clock: &'a dyn Clock,
    settings: &'a RunSettings,
    store: CalibrationStore,
    focuser_limits: MoveLimits,
    wheel_limits: MoveLimits,
    min_offset_version: AppVersion,
}

impl<'a, R: RemoteControl> Calibrator<'a, R> {
    pub fn new(
        app: &'a Ccdciel<R>,
        clock: &'a dyn Clock,
        config: &Config,
        settings: &'a RunSettings,
    ) -> Self {
        Self {
            app,
            clock,
            settings,
            store: CalibrationStore::new(&settings.database),
            focuser_limits: config.focuser.limits(),
            wheel_limits: config.filter_wheel.limits(),
            min_offset_version: config.calibration.min_offset_version.clone(),
        }
    }

    pub fn store(&self) -> &CalibrationStore {
        &self.store
    }

    /// Runs the selected mode and reports fatal errors to the session log.
    pub async fn execute(&self) -> ExitStatus {
        match self.run().await {
            Ok(()) => {
                self.app
                    .info(&format!("{} finished", self.settings.mode))
                    .await;
                ExitStatus::Success
            }
            Err(e) => {
                self.app.critical(&e.to_string()).await;
                ExitStatus::Fatal
            }
        }
    }

    pub async fn run(&self) -> CalibrationResult<()> {
        self.app
            .info(&format!(
                "Mode {}, store {}",
                self.settings.mode,
                self.store.path().display()
            ))
            .await;
        self.check_devices().await?;

        match self.settings.mode {
            Mode::Calculate => self.calculate().await.map(|_| ()),
            Mode::Read => self.read().await.map(|_| ()),
            Mode::Reset => self.reset().await,
        }
    }

    async fn check_devices(&self) -> CalibrationResult<()> {
        if !self.app.focuser_connected().await? {
            return Err(CalibrationError::FocuserDisconnected);
        }
        if !self.app.wheel_connected().await? {
            return Err(CalibrationError::WheelDisconnected);
        }
        Ok(())
    }

    /// Whether this application version accepts `Set_FilterOffset`
    async fn offsets_supported(&self) -> bool {
        match self.app.version().await {
            Ok(version) if version.at_least(&self.min_offset_version) => {
                self.app
                    .info(&format!("CCDciel version {}", version))
                    .await;
                true
            }
            Ok(version) => {
                self.app
                    .warning(&format!(
                        "CCDciel version {} is older than {}, filter offsets will only be stored",
                        version, self.min_offset_version
                    ))
                    .await;
                false
            }
            Err(e) => {
                self.app
                    .warning(&format!(
                        "Cannot read CCDciel version ({}), filter offsets will only be stored",
                        e
                    ))
                    .await;
                false
            }
        }
    }

    async fn filters(&self) -> CalibrationResult<Vec<String>> {
        let filters = self.app.filter_names().await?;
        if filters.is_empty() {
            return Err(CalibrationError::NoFilters);
        }
        Ok(filters)
    }

    /// Slot named by the command line, if it names one of `filters`
    async fn explicit_reference(&self, filters: &[String]) -> Option<u32> {
        let arg = self.settings.reference.as_ref()?;
        match resolve_reference_arg(arg, filters) {
            Some((slot, name)) => {
                self.app
                    .info(&format!(
                        "Reference filter from arguments: index {} name {}",
                        slot, name
                    ))
                    .await;
                Some(slot)
            }
            None => {
                self.app
                    .warning(&format!(
                        "Reference filter {} not found in the filter wheel, argument ignored",
                        arg
                    ))
                    .await;
                None
            }
        }
    }

    async fn zero_offsets(&self, filters: &[String]) -> CalibrationResult<()> {
        for filter in filters {
            self.app.set_filter_offset(filter, 0).await?;
        }
        self.app.info("Filter offsets set to 0").await;
        Ok(())
    }

    async fn push_offsets(&self, offsets: &[(String, i64)]) -> CalibrationResult<()> {
        for (filter, offset) in offsets {
            self.app.set_filter_offset(filter, *offset).await?;
            self.app
                .info(&format!("Offset for {} set to {}", filter, offset))
                .await;
        }
        Ok(())
    }

    /// Wheel to `slot`. Returns the slot actually selected.
    async fn select_slot(&self, slot: u32) -> CalibrationResult<u32> {
        let wheel = WheelAxis::new(self.app);
        match move_to(&wheel, slot, self.wheel_limits, self.clock, self.app).await? {
            MoveOutcome::Reached(s) => Ok(s),
            MoveOutcome::NotReachedButRestored { target, position } => {
                self.app
                    .error(&format!(
                        "Filter wheel not set to index {} but restored to index {}",
                        target, position
                    ))
                    .await;
                Ok(position)
            }
        }
    }

    /// Focuser to `position`, accepting a restored focuser.
    async fn focus_at(&self, position: i64) -> CalibrationResult<i64> {
        let focuser = FocuserAxis::new(self.app);
        match move_to(&focuser, position, self.focuser_limits, self.clock, self.app).await? {
            MoveOutcome::Reached(p) => Ok(p),
            MoveOutcome::NotReachedButRestored { target, position } => {
                self.app
                    .error(&format!(
                        "Focuser not set to {} but restored to {}",
                        target, position
                    ))
                    .await;
                Ok(position)
            }
        }
    }

    /// Selects `slot` and moves the focuser to the position stored for the filter
    /// actually selected. Returns that slot.
    async fn select_filter(
        &self,
        slot: u32,
        filters: &[String],
    ) -> CalibrationResult<(u32, FinalFocus)> {
        let selected = self.select_slot(slot).await?;
        let Some(filter) = (selected as usize)
            .checked_sub(1)
            .and_then(|i| filters.get(i))
        else {
            let current = self.app.focuser_position().await?;
            return Ok((selected, FinalFocus::UsedCurrentPosition(current)));
        };
        self.app
            .info(&format!("Filter wheel set to index {} name {}", selected, filter))
            .await;

        let read = self.store.read(filter);
        if read.status.has_position() {
            let position = self.focus_at(read.record.focuser_position).await?;
            self.app
                .info(&format!("Focuser set to {} for {}", position, filter))
                .await;
            Ok((selected, FinalFocus::Stored(position)))
        } else {
            let current = self.app.focuser_position().await?;
            self.app
                .warning(&format!(
                    "Cannot read focuser position for {} ({}), keeping current position {}",
                    filter, read.status, current
                ))
                .await;
            Ok((selected, FinalFocus::UsedCurrentPosition(current)))
        }
    }
}
