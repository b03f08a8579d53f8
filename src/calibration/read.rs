use super::*;

impl<'a, R: RemoteControl> Calibrator<'a, R> {
    /// Applies the stored calibration: selects the reference filter at its stored
    /// position and pushes the offsets. Returns the slot left selected.
    pub async fn read(&self) -> CalibrationResult<(u32, FinalFocus)> {
        let filters = self.filters().await?;
        let start_slot = self.app.wheel_slot().await?;
        let explicit = self.explicit_reference(&filters).await;

        let mut records = Vec::with_capacity(filters.len());
        for filter in &filters {
            let read = self.store.read(filter);
            if !read.status.has_position() {
                return Err(CalibrationError::MissingCalibration {
                    filter: filter.clone(),
                    status: read.status,
                });
            }
            if read.status != ReadStatus::Complete {
                self.app
                    .warning(&format!("Stored record for {} is partial: {}", filter, read.status))
                    .await;
            }
            self.app
                .info(&format!(
                    "Stored {}: position {}, offset {}, reference {}, in use {}",
                    filter,
                    read.record.focuser_position,
                    read.record.offset,
                    read.record.reference,
                    read.record.in_use
                ))
                .await;
            records.push(read.record);
        }

        let mut tracker = ReferenceTracker::new(explicit);
        for (i, (filter, record)) in filters.iter().zip(&records).enumerate() {
            match tracker.claim(i as u32 + 1, record.reference) {
                Claim::Overridden { explicit } => {
                    self.app
                        .info(&format!(
                            "Stored reference {} overridden by index {} from arguments",
                            filter, explicit
                        ))
                        .await
                }
                Claim::Stripped { holder } => {
                    self.app
                        .warning(&format!(
                            "Multiple reference filters found, ignoring {}, reference is index {}",
                            filter, holder
                        ))
                        .await
                }
                _ => {}
            }
        }
        let target = match tracker.reference() {
            Some(slot) => slot,
            None => {
                self.app
                    .info(&format!(
                        "No reference filter stored, keeping index {}",
                        start_slot
                    ))
                    .await;
                start_slot
            }
        };

        let live_offsets = self.offsets_supported().await;
        if live_offsets {
            self.zero_offsets(&filters).await?;
        }

        let (selected, focus) = self.select_filter(target, &filters).await?;

        if live_offsets {
            let offsets: Vec<(String, i64)> = if explicit.is_some() && explicit == Some(selected) {
                let current = self.app.focuser_position().await?;
                self.app
                    .info(&format!(
                        "Offsets recalculated against {} at {}",
                        filters[selected as usize - 1],
                        current
                    ))
                    .await;
                filters
                    .iter()
                    .zip(&records)
                    .map(|(f, r)| (f.clone(), r.focuser_position - current))
                    .collect()
            } else {
                filters
                    .iter()
                    .zip(&records)
                    .map(|(f, r)| (f.clone(), r.offset))
                    .collect()
            };
            self.push_offsets(&offsets).await?;
        }

        Ok((selected, focus))
    }
}
