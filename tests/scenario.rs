//! End-to-end scenario tests (spec §8) that drive `Bridge` against a real
//! child process speaking the wire protocol over a pipe, the way
//! `examples/shadow_fs`'s `Fixture` drives the teacher's `Vfs` trait
//! directly rather than over the network. The fake controller here is a
//! short `/bin/sh` one-liner rather than a compiled binary.

use uxfs::bridge::{Bridge, BridgeConfig};

/// A controller that answers the handful of requests these scenarios
/// exercise. Table-driven by `case`, so request order doesn't matter.
const FAKE_CONTROLLER: &str = r#"
while IFS= read -r line; do
  case "$line" in
    INIT)
      printf '%s\n' '+OK;DIR'
      printf '%s\n' '/hello rw'
      printf '%s\n' '/quitter rw'
      printf '%s\n' '/lines rw'
      printf '%s\n' '.'
      ;;
    "READ /hello")
      printf '%s\n' '+OK'
      printf '%s\n' 'hi'
      printf '%s\n' '.'
      ;;
    "READ /lines")
      printf '%s\n' '+OK'
      printf '%s\n' '..hidden'
      printf '%s\n' 'plain'
      printf '%s\n' '.'
      ;;
    "READ /quitter")
      printf '%s\n' '+OK;QUIT'
      printf '%s\n' 'bye'
      printf '%s\n' '.'
      ;;
    "WRITE /note")
      while IFS= read -r d; do
        [ "$d" = "." ] && break
      done
      printf '%s\n' '+OK'
      ;;
    FILEOP)
      while IFS= read -r d; do
        [ "$d" = "." ] && break
      done
      printf '%s\n' '+OK'
      ;;
    *)
      printf '%s\n' '-ERR'
      ;;
  esac
done
"#;

/// `Bridge` never touches the mount point itself (mounting is `fuse_mt`'s
/// job, exercised only by hand, not in this suite) — it only forwards the
/// path to the controller's environment — so a `TempDir` just stands in
/// for a plausible mount path.
fn spawn_test_bridge() -> (Bridge, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = BridgeConfig {
        mount_point: dir.path().to_path_buf(),
        controller_argv: vec!["/bin/sh".to_string(), "-c".to_string(), FAKE_CONTROLLER.to_string()],
        other_users_level: 0,
        debug: false,
    };
    let bridge = Bridge::new(config).expect("bridge starts with a live controller");
    (bridge, dir)
}

/// Scenario 1: declare-then-read. `INIT`'s `DIR` directive announces
/// `/hello`; reading it round-trips a `READ` to the controller.
#[test]
fn declare_then_read() {
    let (bridge, _dir) = spawn_test_bridge();

    let attr = bridge.getattr("/hello").expect("declared by INIT's DIR directive");
    assert!(!attr.is_dir);

    let fh = bridge.open("/hello", true, false).expect("read-only open");
    let data = bridge.read(fh, 0, 100).expect("read");
    assert_eq!(data, b"hi\n");
    bridge.release(fh).expect("release");

    bridge.shutdown();
}

/// Scenario 2: write-back. An implicit create under `/` followed by a
/// write and release sends the full buffer as `WRITE /note`.
#[test]
fn write_back_on_release() {
    let (bridge, _dir) = spawn_test_bridge();

    let fh = bridge.create("/note").expect("create succeeds under writable root");
    bridge.write(fh, 0, b"ok\n").expect("write");
    bridge.release(fh).expect("release sends WRITE and gets +OK");

    // USER files retain their buffer in the entry; a fresh open sees it
    // without contacting the controller again.
    let fh2 = bridge.open("/note", true, false).expect("reopen");
    let data = bridge.read(fh2, 0, 100).expect("read back retained buffer");
    assert_eq!(data, b"ok\n");
    bridge.release(fh2).expect("release");

    bridge.shutdown();
}

/// Scenario 3: USER file rename. Creating `/a`, writing to it, and
/// renaming to `/b` issues `FILEOP rename /a /b`; afterwards `/a` is gone
/// and `/b` carries the old retained buffer.
#[test]
fn user_file_rename_moves_retained_buffer() {
    let (bridge, _dir) = spawn_test_bridge();

    let fh = bridge.create("/a").expect("create");
    bridge.write(fh, 0, b"X").expect("write");
    bridge.release(fh).expect("release");

    bridge.rename("/a", "/b").expect("rename via FILEOP");

    assert!(bridge.getattr("/a").is_err(), "source is gone after rename");
    let fh = bridge.open("/b", true, false).expect("destination exists");
    let data = bridge.read(fh, 0, 100).expect("read");
    assert_eq!(data, b"X");
    bridge.release(fh).expect("release");

    bridge.shutdown();
}

/// Scenario 4: rmdir on a non-empty directory fails locally without
/// contacting the controller at all.
#[test]
fn rmdir_non_empty_is_rejected_without_a_round_trip() {
    let (bridge, _dir) = spawn_test_bridge();

    bridge.mkdir("/d").expect("mkdir via FILEOP");
    let fh = bridge.create("/d/x").expect("create under the new directory");
    bridge.release(fh).expect("release");

    let err = bridge.rmdir("/d").expect_err("directory is not empty");
    assert_eq!(err, uxfs::error::BridgeError::NotEmpty);

    bridge.shutdown();
}

/// Scenario 5: a data line that begins with `.` arrives doubled on the
/// wire and is unescaped back to a single leading dot.
#[test]
fn escaped_data_line_round_trips() {
    let (bridge, _dir) = spawn_test_bridge();

    let fh = bridge.open("/lines", true, false).expect("read-only open");
    let data = bridge.read(fh, 0, 100).expect("read");
    assert_eq!(data, b".hidden\nplain\n");
    bridge.release(fh).expect("release");

    bridge.shutdown();
}

/// Scenario 6: a response carrying `+OK;QUIT` causes the bridge to
/// request a clean shutdown.
#[test]
fn quit_directive_requests_shutdown() {
    let (bridge, _dir) = spawn_test_bridge();
    assert!(!bridge.is_shutting_down());

    let fh = bridge.open("/quitter", true, false).expect("read still succeeds once");
    let data = bridge.read(fh, 0, 100).expect("read");
    assert_eq!(data, b"bye\n");
    bridge.release(fh).expect("release");

    assert!(bridge.is_shutting_down());
}
