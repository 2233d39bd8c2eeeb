use super::Converter;
use crate::config::Config;
use crate::error::ConvertError;
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Output, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub struct Pandoc {
    program: String,
    from: String,
    to: String,
    standalone: bool,
    timeout: Option<Duration>,
}

impl Pandoc {
    pub fn new(cfg: &Config) -> Self {
        let c = &cfg.converter;
        Self {
            program: c.program.clone(),
            from: c.from.clone(),
            to: c.to.clone(),
            standalone: c.standalone,
            timeout: (c.timeout_seconds > 0).then(|| Duration::from_secs(c.timeout_seconds)),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn run(&self, args: &[String]) -> Result<Output, ConvertError> {
        debug!("run {} {}", self.program, args.join(" "));
        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ConvertError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let output = wait_with_timeout(&mut child, self.timeout).map_err(|e| match e {
            Waited::Io(source) => ConvertError::Io {
                path: self.program.clone().into(),
                source,
            },
            Waited::TimedOut { stdout, stderr } => ConvertError::TimedOut {
                program: self.program.clone(),
                secs: self.timeout.map(|t| t.as_secs()).unwrap_or_default(),
                stdout,
                stderr,
            },
        })?;

        if !output.status.success() {
            return Err(ConvertError::Failed {
                program: self.program.clone(),
                status: output.status.to_string(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        if !output.stderr.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!("{} stderr: {}", self.program, stderr.trim());
        }
        Ok(output)
    }
}

impl Converter for Pandoc {
    fn version(&self) -> Result<String, ConvertError> {
        let out = self.run(&["--version".to_string()])?;
        let text = String::from_utf8_lossy(&out.stdout);
        Ok(text.lines().next().unwrap_or_default().trim().to_string())
    }

    fn convert(
        &self,
        markdown: &Path,
        output: &Path,
        extra_args: &[String],
    ) -> Result<(), ConvertError> {
        let mut args = vec![markdown.display().to_string()];
        if self.standalone {
            args.push("--standalone".to_string());
        }
        args.push(format!("--from={}", self.from));
        args.push(format!("--to={}", self.to));
        args.push(format!("--output={}", output.display()));
        args.extend(extra_args.iter().cloned());

        // A leftover file from an earlier run must not pass the output check.
        match std::fs::remove_file(output) {
            Ok(()) => debug!("removed stale {}", output.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(ConvertError::Io {
                    path: output.to_path_buf(),
                    source,
                });
            }
        }
        self.run(&args)?;

        if !output.is_file() {
            return Err(ConvertError::MissingOutput {
                path: output.to_path_buf(),
            });
        }
        Ok(())
    }
}

enum Waited {
    Io(std::io::Error),
    TimedOut { stdout: String, stderr: String },
}

fn wait_with_timeout(child: &mut Child, timeout: Option<Duration>) -> Result<Output, Waited> {
    // Drain pipes while waiting so a chatty converter can't block on a full
    // stdout/stderr buffer.
    let stdout_rx = drain(child.stdout.take());
    let stderr_rx = drain(child.stderr.take());

    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait().map_err(Waited::Io)? {
            return Ok(Output {
                status,
                stdout: stdout_rx.recv().unwrap_or_default(),
                stderr: stderr_rx.recv().unwrap_or_default(),
            });
        }

        if let Some(limit) = timeout {
            if start.elapsed() > limit {
                warn!("converter timed out after {:?}; killing it", limit);
                let _ = child.kill();
                child.wait().map_err(Waited::Io)?;
                // A forked grandchild can keep the pipes open after the kill,
                // so collect whatever arrives within the grace period.
                return Err(Waited::TimedOut {
                    stdout: collect(&stdout_rx),
                    stderr: collect(&stderr_rx),
                });
            }
        }

        std::thread::sleep(Duration::from_millis(50));
    }
}

const DRAIN_GRACE: Duration = Duration::from_secs(2);

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut p) = pipe {
            let _ = p.read_to_end(&mut buf);
        }
        let _ = tx.send(buf);
    });
    rx
}

fn collect(rx: &Receiver<Vec<u8>>) -> String {
    let bytes = rx.recv_timeout(DRAIN_GRACE).unwrap_or_default();
    String::from_utf8_lossy(&bytes).into_owned()
}
