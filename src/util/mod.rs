pub use clock::*;
pub use exit_status::*;
pub use version::*;

mod clock;
mod exit_status;
mod version;

use std::io;
use std::path::{Path, PathBuf};

/// Directory holding the running executable. Relative file names in the
/// configuration resolve against it so the tools work whatever the caller's cwd.
pub fn tool_dir() -> io::Result<PathBuf> {
    let exe = std::env::current_exe()?;
    Ok(exe
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(".")))
}

pub fn resolve_in_tool_dir(path: &Path) -> io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(tool_dir()?.join(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_paths_are_kept() {
        let abs = std::env::temp_dir().join("store.db");
        assert_eq!(resolve_in_tool_dir(&abs).unwrap(), abs);
    }

    #[test]
    fn test_relative_paths_land_next_to_executable() {
        let resolved = resolve_in_tool_dir(Path::new("store.db")).unwrap();
        assert_eq!(resolved.parent().unwrap(), tool_dir().unwrap());
        assert!(resolved.ends_with("store.db"));
    }
}
