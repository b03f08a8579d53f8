use super::*;

impl<'a, R: RemoteControl> Calibrator<'a, R> {
    /// Zeroes every live offset and selects the first filter. The store is not touched.
    pub async fn reset(&self) -> CalibrationResult<()> {
        let filters = self.filters().await?;
        for filter in &filters {
            if let Err(e) = self.app.set_filter_offset(filter, 0).await {
                self.app
                    .warning(&format!("Cannot zero the offset of {}: {}", filter, e))
                    .await;
            }
        }
        self.app.info("Filter offsets set to 0").await;

        let slot = self.select_slot(1).await?;
        self.app
            .info(&format!("Filter wheel at index {} name {}", slot, filters[0]))
            .await;

        match self.settings.seed_position {
            Some(position) if position >= 0 => {
                let position = self.focus_at(position).await?;
                self.app
                    .info(&format!("Focuser set to {}", position))
                    .await;
            }
            Some(position) => {
                self.app
                    .warning(&format!("Focuser position {} ignored", position))
                    .await
            }
            None => {}
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::mock::SimulatedObservatory;
    use crate::util::ManualClock;

    #[tokio::test]
    async fn test_reset_without_position_leaves_focuser() {
        let dir = tempfile::tempdir().unwrap();
        let settings = RunSettings {
            mode: Mode::Reset,
            database: dir.path().join("calibration.db"),
            seed_position: None,
            reference: None,
            subset: None,
            autofocus: Default::default(),
        };
        let sim = SimulatedObservatory::new(&["L", "R"]);
        sim.update(|s| {
            s.wheel_slot = 2;
            s.offsets.insert("R".to_string(), 40);
            s.failing.insert("CCDciel_Version".to_string());
        });
        let app = Ccdciel::new(&sim);
        let clock = ManualClock::new();
        let calibrator = Calibrator::new(&app, &clock, &Config::default(), &settings);

        calibrator.run().await.unwrap();
        let snapshot = sim.snapshot();
        assert_eq!(snapshot.wheel_slot, 1);
        assert_eq!(snapshot.focuser_position, 10000);
        assert_eq!(snapshot.offsets["R"], 0);
        assert_eq!(sim.count("Focuser_setposition"), 0);
        assert!(!dir.path().join("calibration.db").exists());
    }
}
