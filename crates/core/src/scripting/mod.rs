//! External tool execution.
//!
//! The steganography binaries are black boxes reached only through the
//! [`executor::ToolRunner`] trait. [`subprocess::SubprocessRunner`] is the
//! production implementation; tests substitute fakes.

pub mod executor;
pub mod subprocess;

/// Shared test helpers for runner tests.
#[cfg(test)]
pub(crate) mod test_helpers {
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;
    use std::time::Duration;

    use super::executor::{LogSink, ToolInvocation};
    use crate::command::LogKind;

    /// Write `body` as an executable bash script inside `dir`.
    pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/bash\n{body}\n")).expect("write script");
        let mut perms = std::fs::metadata(&path).expect("metadata").permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).expect("chmod");
        path
    }

    /// Invocation of `program` inside `dir` with a 5-second timeout.
    pub fn invocation(program: PathBuf, dir: &Path) -> ToolInvocation {
        ToolInvocation::new(program, dir).with_timeout(Duration::from_secs(5))
    }

    /// A sink that records every emitted line.
    #[derive(Default)]
    pub struct RecordingSink {
        lines: Mutex<Vec<(String, LogKind)>>,
    }

    impl RecordingSink {
        pub fn lines(&self) -> Vec<(String, LogKind)> {
            self.lines.lock().expect("sink lock").clone()
        }
    }

    impl LogSink for RecordingSink {
        fn emit(&self, text: &str, kind: LogKind) {
            self.lines
                .lock()
                .expect("sink lock")
                .push((text.to_string(), kind));
        }
    }
}
