use crate::config::Config;
use crate::rpc::AutofocusKind;
use crate::util::resolve_in_tool_dir;
use clap::{Parser, ValueEnum};
use std::fmt::{Display, Formatter};
use std::io;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, ValueEnum)]
pub enum Mode {
    /// Autofocus every filter and store the results
    #[default]
    Calculate,
    /// Apply the stored calibration
    Read,
    /// Zero all offsets, select the first filter
    Reset,
}

impl Display for Mode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Calculate => f.write_str("CALCULATE"),
            Mode::Read => f.write_str("READ"),
            Mode::Reset => f.write_str("RESET"),
        }
    }
}

/// 1-based slots, written as `[1,3,4]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotSubset(pub Vec<u32>);

impl SlotSubset {
    pub fn contains(&self, slot: u32) -> bool {
        self.0.contains(&slot)
    }
}

impl FromStr for SlotSubset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || format!("invalid subset {:?}, expected a list of slots like [1,3,4]", s);
        let inner = s.trim().trim_start_matches('[').trim_end_matches(']');
        let slots = inner
            .split(',')
            .map(|part| part.trim().parse::<u32>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| invalid())?;
        if slots.is_empty() || slots.contains(&0) {
            return Err(invalid());
        }
        Ok(SlotSubset(slots))
    }
}

impl Display for SlotSubset {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let slots: Vec<String> = self.0.iter().map(u32::to_string).collect();
        write!(f, "[{}]", slots.join(","))
    }
}

/// Reference filter requested on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceArg {
    Name(String),
    Slot(u32),
}

impl Display for ReferenceArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ReferenceArg::Name(name) => write!(f, "name {}", name),
            ReferenceArg::Slot(slot) => write!(f, "index {}", slot),
        }
    }
}

/// Manage the focuser position calibrated for every filter of the wheel
#[derive(Debug, Parser)]
#[command(name = "focuser_position_per_filter", version)]
pub struct Args {
    /// Working mode
    #[arg(short, long, value_enum, ignore_case = true, default_value_t = Mode::Calculate)]
    pub mode: Mode,

    /// Database file, relative paths are taken from the executable's directory
    #[arg(short, long)]
    pub dbname: Option<PathBuf>,

    /// Focuser position to start autofocus from
    #[arg(short = 'f', long, allow_negative_numbers = true)]
    pub focuserposition: Option<i64>,

    /// Reference filter name
    #[arg(short = 'n', long, conflicts_with = "filterid")]
    pub filtername: Option<String>,

    /// Reference filter slot, starting at 1
    #[arg(short = 'i', long, value_parser = clap::value_parser!(u32).range(1..))]
    pub filterid: Option<u32>,

    /// Slots to autofocus, e.g. [1,3,4]. Other filters only get their offset updated
    #[arg(short, long)]
    pub subset: Option<SlotSubset>,

    /// Autofocus routine
    #[arg(short = 't', long, value_enum, ignore_case = true, default_value_t = AutofocusKind::Auto)]
    pub focustype: AutofocusKind,

    /// Configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Everything a run needs to know, fixed before the first device call.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    pub mode: Mode,
    pub database: PathBuf,
    pub seed_position: Option<i64>,
    pub reference: Option<ReferenceArg>,
    pub subset: Option<SlotSubset>,
    pub autofocus: AutofocusKind,
}

impl RunSettings {
    pub fn new(args: Args, config: &Config) -> io::Result<Self> {
        let database = args
            .dbname
            .unwrap_or_else(|| config.calibration.database.clone());

        let reference = match (args.filtername, args.filterid) {
            (Some(name), _) => Some(ReferenceArg::Name(name)),
            (None, Some(slot)) => Some(ReferenceArg::Slot(slot)),
            (None, None) => None,
        };

        Ok(Self {
            mode: args.mode,
            database: resolve_in_tool_dir(&database)?,
            seed_position: args.focuserposition,
            reference,
            subset: args.subset,
            autofocus: args.focustype,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    fn parse(args: &[&str]) -> Result<Args, clap::Error> {
        Args::try_parse_from(std::iter::once("focuser_position_per_filter").chain(args.iter().copied()))
    }

    #[test]
    fn test_defaults() {
        let args = parse(&[]).unwrap();
        assert_eq!(args.mode, Mode::Calculate);
        assert_eq!(args.focustype, AutofocusKind::Auto);
        assert!(args.subset.is_none());
        assert!(args.focuserposition.is_none());
    }

    #[test]
    fn test_case_insensitive_values() {
        let args = parse(&["-m", "RESET", "-t", "INPLACE", "-f", "-250"]).unwrap();
        assert_eq!(args.mode, Mode::Reset);
        assert_eq!(args.focustype, AutofocusKind::Inplace);
        assert_eq!(args.focuserposition, Some(-250));
    }

    #[test]
    fn test_name_and_id_conflict() {
        let err = parse(&["--filtername", "Red", "--filterid", "2"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_subset() {
        let args = parse(&["-s", "[1,3,4]"]).unwrap();
        assert_eq!(args.subset, Some(SlotSubset(vec![1, 3, 4])));
        assert_eq!("2, 5".parse::<SlotSubset>().unwrap(), SlotSubset(vec![2, 5]));
        assert!("[1,x]".parse::<SlotSubset>().is_err());
        assert!("[0,1]".parse::<SlotSubset>().is_err());
        assert!("[]".parse::<SlotSubset>().is_err());
        assert!(parse(&["-s", "[a]"]).is_err());
    }

    #[test]
    fn test_unknown_mode_is_rejected() {
        let err = parse(&["-m", "FAST"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
        assert!(parse(&["-i", "0"]).is_err());
    }

    #[test]
    fn test_run_settings() {
        let args = parse(&["-i", "3", "-d", "/tmp/calibration.db"]).unwrap();
        let settings = RunSettings::new(args, &Config::default()).unwrap();
        assert_eq!(settings.reference, Some(ReferenceArg::Slot(3)));
        assert_eq!(settings.database, PathBuf::from("/tmp/calibration.db"));

        let settings = RunSettings::new(parse(&["-n", "Red"]).unwrap(), &Config::default()).unwrap();
        assert_eq!(settings.reference, Some(ReferenceArg::Name("Red".to_string())));
        assert!(settings.database.is_absolute());
        assert!(settings.database.ends_with("focuser_position_per_filter.db"));
    }
}
