//! Full-duplex pipe to the controller child process: command dispatch,
//! response parsing, and inline namespace directives (§4.D).

mod directive;
pub mod wire;

use std::io::BufReader;
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use crate::error::{BridgeError, Result};

/// One command/response round-trip's outcome: the status, an optional
/// data block (only for commands that expect one, i.e. `READ`), and any
/// inline directives the controller attached to the status line.
pub struct Response {
    pub ok: bool,
    pub data: Option<Vec<u8>>,
    pub quit: bool,
    /// `(path, mode-string)` pairs from a `DIR` directive's data block,
    /// in the order the controller sent them.
    pub dir_entries: Vec<(String, String)>,
}

pub struct Channel {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    debug: bool,
}

impl Channel {
    /// Spawns `argv[0]` with `argv[1..]` as its arguments, wiring its
    /// stdin/stdout to the command and response pipes and setting the
    /// environment variables the controller is guaranteed to see.
    pub fn spawn(argv: &[String], mount_point: &Path, pid: u32, debug: bool) -> Result<Channel> {
        let (program, args) = argv.split_first().ok_or(BridgeError::Protocol)?;
        let mut child = Command::new(program)
            .args(args)
            .env("UXFS_MOUNT_POINT", mount_point)
            .env("UXFS_PID", pid.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()?;
        let stdin = child.stdin.take().expect("piped stdin");
        let stdout = child.stdout.take().expect("piped stdout");
        Ok(Channel { child, stdin, stdout: BufReader::new(stdout), debug })
    }

    fn command_line(cmd: &str, arg: Option<&str>) -> String {
        match arg {
            Some(arg) if !arg.is_empty() => format!("{cmd} {arg}"),
            _ => cmd.to_string(),
        }
    }

    /// Sends `cmd [arg]`, optionally followed by a data block, and reads
    /// back the status line and (if `want_data`) its data block. Applies
    /// the response's directive tokens by reading any `DIR` data block
    /// inline; the caller is responsible for acting on `quit` and
    /// `dir_entries` under the same lock that guards the table.
    fn command(
        &mut self,
        cmd: &str,
        arg: Option<&str>,
        data: Option<&[u8]>,
        want_data: bool,
    ) -> Result<Response> {
        wire::write_line(&mut self.stdin, &Self::command_line(cmd, arg), self.debug)?;
        if let Some(data) = data {
            wire::write_data_block(&mut self.stdin, data, self.debug)?;
        }

        let status_line = wire::read_line(&mut self.stdout, self.debug)?;
        let status_line = String::from_utf8_lossy(&status_line).into_owned();
        let status = directive::parse_status_line(&status_line)?;

        let response_data = if status.ok && want_data {
            Some(wire::read_data_block(&mut self.stdout, self.debug)?)
        } else {
            None
        };

        let mut quit = false;
        let mut dir_entries = Vec::new();
        for keyword in &status.directives {
            match keyword.as_str() {
                "QUIT" => quit = true,
                "DIR" => {
                    loop {
                        let line = wire::read_line(&mut self.stdout, self.debug)?;
                        if line == b"." {
                            break;
                        }
                        let line = String::from_utf8_lossy(&line).into_owned();
                        dir_entries.push(directive::parse_dir_entry(&line)?);
                    }
                }
                _ => return Err(BridgeError::Protocol),
            }
        }

        Ok(Response { ok: status.ok, data: response_data, quit, dir_entries })
    }

    /// `INIT` — sent once at startup, status only.
    pub fn init(&mut self) -> Result<Response> {
        self.command("INIT", None, None, false)
    }

    /// `READ <path>` — expects a data block on success.
    pub fn read_file(&mut self, path: &str) -> Result<Response> {
        self.command("READ", Some(path), None, true)
    }

    /// `WRITE <path>` followed by the handle's buffered contents.
    pub fn write_file(&mut self, path: &str, data: &[u8]) -> Result<Response> {
        self.command("WRITE", Some(path), Some(data), false)
    }

    /// `FILEOP` followed by a data block whose first line is the verb
    /// (`rename`, `unlink`, `mkdir`, `rmdir`) and remaining lines are its
    /// arguments, one per line.
    pub fn fileop(&mut self, verb: &str, args: &[&str]) -> Result<Response> {
        let mut body = Vec::new();
        body.extend_from_slice(verb.as_bytes());
        body.push(b'\n');
        for arg in args {
            body.extend_from_slice(arg.as_bytes());
            body.push(b'\n');
        }
        self.command("FILEOP", None, Some(&body), false)
    }

    /// Best-effort child reap on a clean shutdown path; errors are not
    /// actionable at this point.
    pub fn shutdown(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
