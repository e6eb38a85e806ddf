// File: src/environment.rs
//
// The I/O environment handed to a script instance.
// Host functions reach standard input/output/error through here; a missing
// handle makes those functions produce an Unavailable error value instead
// of failing hard.

use std::io::{self, BufRead, BufReader, Write};
use std::sync::{Arc, Mutex};

use crate::errors::HostCallError;
use crate::value::ErrorValue;

/// Stdio handles for one instance. Handles are shared and locked, so a
/// single environment can back several instances.
#[derive(Clone, Default)]
pub struct ScriptEnvironment {
    stdin: Option<Arc<Mutex<dyn BufRead + Send>>>,
    stdout: Option<Arc<Mutex<dyn Write + Send>>>,
    stderr: Option<Arc<Mutex<dyn Write + Send>>>,
}

impl ScriptEnvironment {
    /// An environment wired to the process stdio streams.
    pub fn standard() -> Self {
        Self {
            stdin: Some(Arc::new(Mutex::new(BufReader::new(io::stdin())))),
            stdout: Some(Arc::new(Mutex::new(io::stdout()))),
            stderr: Some(Arc::new(Mutex::new(io::stderr()))),
        }
    }

    /// An environment with no streams at all; stdio host functions will
    /// report Unavailable.
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn with_stdin(mut self, reader: impl BufRead + Send + 'static) -> Self {
        self.stdin = Some(Arc::new(Mutex::new(reader)));
        self
    }

    pub fn with_stdout(mut self, writer: impl Write + Send + 'static) -> Self {
        self.stdout = Some(Arc::new(Mutex::new(writer)));
        self
    }

    pub fn with_stderr(mut self, writer: impl Write + Send + 'static) -> Self {
        self.stderr = Some(Arc::new(Mutex::new(writer)));
        self
    }

    pub fn print(&self, text: &str) -> Result<(), HostCallError> {
        let stdout = self.stdout.as_ref().ok_or_else(|| HostCallError::unavailable("stdout"))?;
        let mut stdout = stdout.lock().unwrap();
        stdout.write_all(text.as_bytes())?;
        stdout.flush()?;
        Ok(())
    }

    /// Reads one line from stdin, without the trailing newline.
    pub fn read_line(&self) -> Result<String, HostCallError> {
        let stdin = self.stdin.as_ref().ok_or_else(|| HostCallError::unavailable("stdin"))?;
        let mut line = String::new();
        stdin.lock().unwrap().read_line(&mut line)?;
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(line)
    }

    /// Publishes an error value on stderr. Best-effort: a missing or
    /// failing stderr handle swallows the report.
    pub fn log_error(&self, error: &ErrorValue) {
        if let Some(stderr) = &self.stderr {
            let mut stderr = stderr.lock().unwrap();
            let _ = writeln!(stderr, "{}: {}", error.error_type(), error.message());
            let _ = stderr.flush();
        }
    }
}

impl std::fmt::Debug for ScriptEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("ScriptEnvironment")
            .field("stdin", &self.stdin.is_some())
            .field("stdout", &self.stdout.is_some())
            .field("stderr", &self.stderr.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detached_environment_reports_unavailable() {
        let env = ScriptEnvironment::detached();
        let err = env.print("hi").unwrap_err();
        assert_eq!(err.error_type, "Unavailable");
        let err = env.read_line().unwrap_err();
        assert_eq!(err.error_type, "Unavailable");
    }

    #[test]
    fn test_captured_streams() {
        let out: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = SharedSink(out.clone());
        let env = ScriptEnvironment::detached()
            .with_stdin(io::Cursor::new(b"line one\nline two\n".to_vec()))
            .with_stdout(sink);
        env.print("hello").unwrap();
        assert_eq!(&*out.lock().unwrap(), b"hello");
        assert_eq!(env.read_line().unwrap(), "line one");
        assert_eq!(env.read_line().unwrap(), "line two");
    }

    struct SharedSink(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }
}
