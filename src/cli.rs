//! Command-line parsing (§4.G, §6).
//!
//! `<program> <mount-point> [controller-argv…] [flags]`. Flags are
//! recognized wherever they fall in the argument list, not only after
//! the mount point or only before the controller's own arguments — the
//! same per-token classification the source's `fuse_opt_parse` call does
//! (uxfs.c:1609-1657): every token is tested against the known flag set
//! independently, and whatever is left over, in order, becomes the
//! controller's argv. `clap`'s derive-based positional capture can't
//! express this — `trailing_var_arg` stops recognizing flags the moment
//! the controller's argv starts — so the split is done by hand instead.

use std::path::PathBuf;

/// Parsed command line, with the `dbg=<N>` pseudo-flag still sitting
/// inside `controller` (see [`Cli::take_dbg_level`]).
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Cli {
    /// Directory to mount the bridge onto.
    pub mount_point: PathBuf,

    /// The controller program and its arguments, in the order given.
    /// May also contain a bare `dbg=<N>` token, extracted by
    /// `take_dbg_level` before the rest is used as the controller's argv.
    pub controller: Vec<String>,

    /// Run in the foreground. Accepted for source fidelity; this bridge
    /// never daemonizes on its own, so the flag is a logged no-op.
    pub foreground: bool,

    /// Trace wire traffic to stderr as `>> `/`<< ` lines.
    pub debug: bool,

    /// Informational verbosity, each `-v` (or a combined `-vv`) adding
    /// one level; capped at 2 by [`Cli::verbosity`].
    pub verbose: u8,

    /// Relaxation of the "current user only" access story: one `-o`
    /// allows root, a second allows other users entirely; capped at 2
    /// by [`Cli::other_users_level`].
    pub other_users: u8,

    /// Dispatch filesystem callbacks on a single worker thread.
    pub single_thread: bool,
}

impl Cli {
    /// Parses `std::env::args()`, skipping the program name.
    pub fn parse() -> Cli {
        Cli::parse_from(std::env::args().skip(1))
    }

    /// Classifies every token as a recognized flag or plain argv. The
    /// first plain-argv token becomes the mount point; every later one
    /// is appended to the controller's argv, in order.
    pub fn parse_from(args: impl IntoIterator<Item = String>) -> Cli {
        let mut cli = Cli::default();
        for token in args {
            match token.as_str() {
                "-f" => cli.foreground = true,
                "-d" => cli.debug = true,
                "-v" => cli.verbose = cli.verbose.saturating_add(1),
                "-vv" => cli.verbose = cli.verbose.saturating_add(2),
                "-o" => cli.other_users = cli.other_users.saturating_add(1),
                "-oo" => cli.other_users = cli.other_users.saturating_add(2),
                "-s" => cli.single_thread = true,
                _ if cli.mount_point.as_os_str().is_empty() => cli.mount_point = PathBuf::from(token),
                _ => cli.controller.push(token),
            }
        }
        cli
    }

    /// Pulls a `dbg=<N>` token out of `controller` if present, wherever it
    /// falls in the list, returning the parsed level. Leaves the rest of
    /// `controller` as the actual controller argv.
    pub fn take_dbg_level(&mut self) -> Option<u32> {
        let pos = self.controller.iter().position(|tok| tok.starts_with("dbg="))?;
        let tok = self.controller.remove(pos);
        tok["dbg=".len()..].parse().ok()
    }

    pub fn other_users_level(&self) -> u8 {
        self.other_users.min(2)
    }

    pub fn verbosity(&self) -> u8 {
        self.verbose.min(2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn dbg_token_is_extracted_from_anywhere_in_argv() {
        let mut cli = Cli::parse_from(args(&["/mnt", "ctrl", "dbg=5", "--extra"]));
        assert_eq!(cli.take_dbg_level(), Some(5));
        assert_eq!(cli.controller, vec!["ctrl".to_string(), "--extra".to_string()]);
    }

    #[test]
    fn no_dbg_token_leaves_argv_untouched() {
        let mut cli = Cli::parse_from(args(&["/mnt", "ctrl", "arg1"]));
        assert_eq!(cli.take_dbg_level(), None);
        assert_eq!(cli.controller, vec!["ctrl".to_string(), "arg1".to_string()]);
    }

    #[test]
    fn other_users_and_verbosity_cap_at_two() {
        let cli = Cli::parse_from(args(&["/mnt", "ctrl", "-o", "-o", "-o"]));
        assert_eq!(cli.other_users_level(), 2);
        let cli = Cli::parse_from(args(&["/mnt", "ctrl", "-v", "-v", "-v"]));
        assert_eq!(cli.verbosity(), 2);
    }

    /// A flag given *after* the controller's own argv must still be
    /// recognized as a flag, not swallowed into `controller` — the bug a
    /// `trailing_var_arg` positional would have introduced.
    #[test]
    fn a_flag_after_controller_argv_is_still_recognized() {
        let cli = Cli::parse_from(args(&["/mnt", "ctrlprog", "arg1", "-d"]));
        assert!(cli.debug);
        assert_eq!(cli.controller, vec!["ctrlprog".to_string(), "arg1".to_string()]);
    }

    #[test]
    fn flags_interspersed_with_controller_argv_are_all_recognized() {
        let cli = Cli::parse_from(args(&["/mnt", "-v", "ctrlprog", "-o", "arg1", "-s", "arg2"]));
        assert_eq!(cli.verbosity(), 1);
        assert_eq!(cli.other_users_level(), 1);
        assert!(cli.single_thread);
        assert_eq!(cli.controller, vec!["ctrlprog".to_string(), "arg1".to_string(), "arg2".to_string()]);
    }
}
