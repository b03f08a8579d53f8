use super::*;

impl<'a, R: RemoteControl> Calibrator<'a, R> {
    /// Autofocuses every slot in wheel order, then stores positions and
    /// offsets relative to the reference filter.
    pub async fn calculate(&self) -> CalibrationResult<Vec<SlotCalibration>> {
        let filters = self.filters().await?;
        let start_slot = self.app.wheel_slot().await?;
        self.app
            .info(&format!(
                "Filters {:?}, selected at start: index {}",
                filters, start_slot
            ))
            .await;
        if let Some(subset) = &self.settings.subset {
            self.app
                .info(&format!("Filter subset {}", subset))
                .await;
        }

        let explicit = self.explicit_reference(&filters).await;
        let live_offsets = self.offsets_supported().await;
        if live_offsets {
            self.zero_offsets(&filters).await?;
        }

        let mut tracker = ReferenceTracker::new(explicit);
        let mut slots = Vec::with_capacity(filters.len());
        for (i, filter) in filters.iter().enumerate() {
            let slot = i as u32 + 1;
            slots.push(self.calibrate_slot(slot, filter, &mut tracker).await?);
        }

        let reference = tracker.reference();
        let zero_slot = reference.unwrap_or(start_slot);
        let zero_position = match slots.iter().find(|s| s.slot == zero_slot) {
            Some(s) => s.record.focuser_position,
            None => {
                self.app
                    .warning(&format!(
                        "Slot {} is not on the wheel, offsets are absolute positions",
                        zero_slot
                    ))
                    .await;
                0
            }
        };
        match reference {
            Some(slot) => {
                self.app
                    .info(&format!(
                        "Reference filter index {} at {}",
                        slot, zero_position
                    ))
                    .await
            }
            None => {
                self.app
                    .info(&format!(
                        "No reference filter, offsets relative to index {} at {}",
                        zero_slot, zero_position
                    ))
                    .await
            }
        }

        for s in slots.iter_mut() {
            s.record.reference = Some(s.slot) == reference;
            s.record.offset = s.record.focuser_position - zero_position;
        }

        for s in &slots {
            match self.store.write(&s.filter, &s.record) {
                Ok(()) => {
                    self.app
                        .info(&format!(
                            "Stored {}: position {}, offset {}, reference {}, in use {}",
                            s.filter,
                            s.record.focuser_position,
                            s.record.offset,
                            s.record.reference,
                            s.record.in_use
                        ))
                        .await
                }
                Err(e) => self.app.error(&e.to_string()).await,
            }
        }

        if live_offsets {
            let offsets: Vec<(String, i64)> = slots
                .iter()
                .map(|s| (s.filter.clone(), s.record.offset))
                .collect();
            self.push_offsets(&offsets).await?;
        }

        if start_slot >= 1 && start_slot as usize <= filters.len() {
            let (_, focus) = self.select_filter(start_slot, &filters).await?;
            if let FinalFocus::UsedCurrentPosition(p) = focus {
                self.app
                    .warning(&format!("Focuser left at current position {}", p))
                    .await;
            }
        } else {
            self.app
                .warning(&format!(
                    "Filter wheel was at index {} at start, which is not a slot, leaving it where it is",
                    start_slot
                ))
                .await;
        }

        Ok(slots)
    }

    async fn calibrate_slot(
        &self,
        slot: u32,
        filter: &str,
        tracker: &mut ReferenceTracker,
    ) -> CalibrationResult<SlotCalibration> {
        self.app
            .info(&format!("Selected filter index {} name {}", slot, filter))
            .await;

        let names = self.app.filter_names().await?;
        if names.get(slot as usize - 1).map(String::as_str) != Some(filter) {
            self.app
                .error(&format!("Filter {} not found at index {}", filter, slot))
                .await;
            return self.failed_slot(slot, filter, tracker).await;
        }

        if self.select_slot(slot).await? != slot {
            return self.failed_slot(slot, filter, tracker).await;
        }

        let read = self.store.read(filter);
        if read.usage_missing {
            self.app
                .warning(&format!("No usage flag stored for {}, filter is in use", filter))
                .await;
        }

        let (stored_reference, mut in_use) = if read.status.has_position() {
            self.app
                .info(&format!(
                    "Focuser position for {} read from store is {} ({})",
                    filter, read.record.focuser_position, read.status
                ))
                .await;
            self.focus_at(read.record.focuser_position).await?;
            (read.record.reference, read.record.in_use)
        } else {
            self.app
                .warning(&format!(
                    "Cannot read focuser position for {} from store ({})",
                    filter, read.status
                ))
                .await;
            self.seed(filter).await?;
            (false, true)
        };

        if let Some(subset) = &self.settings.subset {
            let wanted = subset.contains(slot);
            if wanted != in_use {
                let verb = if wanted { "in use" } else { "not in use" };
                self.app
                    .info(&format!(
                        "Filter {} index {} marked {} by the subset",
                        filter, slot, verb
                    ))
                    .await;
            }
            in_use = wanted;
        }

        let claim = tracker.claim(slot, stored_reference);
        match claim {
            Claim::Explicit | Claim::Stored => {
                self.app
                    .info(&format!("Filter {} is the reference filter", filter))
                    .await
            }
            Claim::Stripped { holder } => {
                self.app
                    .warning(&format!(
                        "Multiple reference filters found, flag removed from {} index {}, reference is index {}",
                        filter, slot, holder
                    ))
                    .await
            }
            Claim::Overridden { explicit } => {
                self.app
                    .info(&format!(
                        "Stored reference flag of {} overridden by index {} from arguments",
                        filter, explicit
                    ))
                    .await
            }
            Claim::NotReference => {}
        }

        let position = if claim.is_reference() || in_use {
            if !in_use {
                self.app
                    .info(&format!(
                        "Focusing {} although it is not in use, it is the reference",
                        filter
                    ))
                    .await;
            }
            self.app
                .info(&format!(
                    "Running {} autofocus for {}",
                    self.settings.autofocus, filter
                ))
                .await;
            match self.app.autofocus(self.settings.autofocus).await {
                Ok(_) => {}
                Err(e) if e.is_remote() => {
                    self.app
                        .error(&format!(
                            "Autofocus failed for {}: {}, keeping current focuser position",
                            filter, e
                        ))
                        .await
                }
                Err(e) => return Err(e.into()),
            }
            let position = self.app.focuser_position().await?;
            self.app
                .info(&format!("Calculated focuser position for {} is {}", filter, position))
                .await;
            position
        } else {
            self.app
                .info(&format!("Skipping autofocus for {}, not in use", filter))
                .await;
            if read.status.has_position() {
                read.record.focuser_position
            } else {
                self.app.focuser_position().await?
            }
        };

        Ok(SlotCalibration {
            slot,
            filter: filter.to_string(),
            record: CalibrationRecord {
                focuser_position: position,
                reference: claim.is_reference(),
                offset: 0,
                in_use,
            },
            failed: false,
        })
    }

    /// Positions the focuser for a filter with no stored calibration.
    async fn seed(&self, filter: &str) -> CalibrationResult<()> {
        if let Some(position) = self.settings.seed_position.filter(|p| *p != 0) {
            let position = self.focus_at(position).await?;
            self.app
                .info(&format!("Focuser set to {} from arguments before autofocus", position))
                .await;
            return Ok(());
        }

        let current = self.app.focuser_position().await?;
        if current == 0 {
            return Err(CalibrationError::UnseededAutofocus {
                filter: filter.to_string(),
            });
        }
        self.app
            .info(&format!("Using current focuser position {} before autofocus", current))
            .await;
        Ok(())
    }

    async fn failed_slot(
        &self,
        slot: u32,
        filter: &str,
        tracker: &mut ReferenceTracker,
    ) -> CalibrationResult<SlotCalibration> {
        let position = self.app.focuser_position().await?;
        Ok(SlotCalibration {
            slot,
            filter: filter.to_string(),
            record: CalibrationRecord {
                focuser_position: position,
                reference: tracker.claim(slot, false).is_reference(),
                offset: 0,
                in_use: true,
            },
            failed: true,
        })
    }
}
