use super::settings::ReferenceArg;

/// Finds the wheel slot named by the command line argument.
pub fn resolve_reference_arg(arg: &ReferenceArg, filters: &[String]) -> Option<(u32, String)> {
    match arg {
        ReferenceArg::Name(name) => filters
            .iter()
            .position(|f| f == name)
            .map(|i| (i as u32 + 1, name.clone())),
        ReferenceArg::Slot(slot) => {
            let index = (*slot as usize).checked_sub(1)?;
            filters.get(index).map(|name| (*slot, name.clone()))
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Claim {
    /// Named on the command line
    Explicit,
    /// First stored reference flag seen
    Stored,
    /// Stored flag ignored, another slot came first
    Stripped { holder: u32 },
    /// Stored flag ignored, the command line names another slot
    Overridden { explicit: u32 },
    NotReference,
}

impl Claim {
    pub fn is_reference(&self) -> bool {
        matches!(self, Claim::Explicit | Claim::Stored)
    }
}

/// Applies the reference precedence slot by slot: the command line argument
/// wins, otherwise the first stored flag. Later stored flags lose theirs.
#[derive(Debug)]
pub struct ReferenceTracker {
    explicit: Option<u32>,
    stored: Option<u32>,
}

impl ReferenceTracker {
    pub fn new(explicit: Option<u32>) -> Self {
        Self {
            explicit,
            stored: None,
        }
    }

    pub fn claim(&mut self, slot: u32, stored_flag: bool) -> Claim {
        if self.explicit == Some(slot) {
            return Claim::Explicit;
        }
        if !stored_flag {
            return Claim::NotReference;
        }

        match (self.explicit, self.stored) {
            (Some(explicit), _) => Claim::Overridden { explicit },
            (None, Some(holder)) => Claim::Stripped { holder },
            (None, None) => {
                self.stored = Some(slot);
                Claim::Stored
            }
        }
    }

    pub fn reference(&self) -> Option<u32> {
        self.explicit.or(self.stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wheel() -> Vec<String> {
        ["Luminance", "Red", "Green", "Blue"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn test_resolve_argument() {
        let filters = wheel();
        assert_eq!(
            resolve_reference_arg(&ReferenceArg::Name("Green".to_string()), &filters),
            Some((3, "Green".to_string()))
        );
        assert_eq!(
            resolve_reference_arg(&ReferenceArg::Slot(2), &filters),
            Some((2, "Red".to_string()))
        );
        assert_eq!(resolve_reference_arg(&ReferenceArg::Slot(5), &filters), None);
        assert_eq!(resolve_reference_arg(&ReferenceArg::Slot(0), &filters), None);
        assert_eq!(
            resolve_reference_arg(&ReferenceArg::Name("Ha".to_string()), &filters),
            None
        );
    }

    #[test]
    fn test_first_stored_flag_wins() {
        let mut tracker = ReferenceTracker::new(None);
        assert_eq!(tracker.claim(1, false), Claim::NotReference);
        assert_eq!(tracker.claim(2, true), Claim::Stored);
        assert_eq!(tracker.claim(3, true), Claim::Stripped { holder: 2 });
        assert_eq!(tracker.reference(), Some(2));
    }

    #[test]
    fn test_explicit_wins() {
        let mut tracker = ReferenceTracker::new(Some(3));
        assert_eq!(tracker.claim(1, true), Claim::Overridden { explicit: 3 });
        assert_eq!(tracker.claim(3, false), Claim::Explicit);
        assert!(tracker.claim(3, false).is_reference());
        assert_eq!(tracker.reference(), Some(3));
    }

    #[test]
    fn test_no_reference() {
        let mut tracker = ReferenceTracker::new(None);
        for slot in 1..=4 {
            assert!(!tracker.claim(slot, false).is_reference());
        }
        assert_eq!(tracker.reference(), None);
    }
}
