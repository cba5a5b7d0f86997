use std::borrow::Cow;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::config::TtsSettings;

#[derive(thiserror::Error, Debug)]
pub enum EspeakError {
    #[error(
        "espeak-ng not found at '{0}'. Install: Linux: `sudo apt-get install espeak-ng`, \
         macOS: `brew install espeak-ng`, Windows: https://espeak-ng.org/download"
    )]
    NotFound(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("espeak-ng exited with code {code:?}: {stderr}")]
    Failed { code: Option<i32>, stderr: String },
}

/// Location of the espeak-ng binary and its data directory.
///
/// Either path can be `None` to use `espeak-ng` from PATH and its compiled-in data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EspeakConfig {
    pub bin_path: Option<PathBuf>,
    pub data_path: Option<PathBuf>,
}

impl EspeakConfig {
    pub fn from_settings(settings: &TtsSettings) -> Self {
        Self {
            bin_path: settings.espeak_path.clone(),
            data_path: settings.espeak_data_path.clone(),
        }
    }

    fn binary(&self) -> &Path {
        self.bin_path
            .as_deref()
            .unwrap_or_else(|| Path::new("espeak-ng"))
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(self.binary());
        if let Some(data) = &self.data_path {
            cmd.arg("--path").arg(data);
        }
        cmd
    }

    /// Probe the binary, returning its version banner.
    pub fn version(&self) -> Result<String, EspeakError> {
        let out = self.run(&["--version"], None)?;
        Ok(String::from_utf8_lossy(&out).trim().to_string())
    }

    /// Run espeak-ng with `args`, optionally feeding `stdin`, and return raw stdout.
    ///
    /// Input is written from a separate thread while stdout is drained, since espeak-ng
    /// emits output before it has read all of its input.
    pub fn run(&self, args: &[&str], stdin: Option<&str>) -> Result<Vec<u8>, EspeakError> {
        let mut child = self
            .command()
            .args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    EspeakError::NotFound(self.binary().display().to_string())
                } else {
                    EspeakError::Io(e)
                }
            })?;

        let pipe = child.stdin.take();
        let (written, output) = std::thread::scope(|scope| {
            let writer = scope.spawn(move || match (stdin, pipe) {
                // The pipe is dropped on return, closing the child's stdin.
                (Some(input), Some(mut pipe)) => pipe.write_all(line_terminated(input).as_bytes()),
                _ => Ok(()),
            });
            let output = child.wait_with_output();
            let written = writer
                .join()
                .unwrap_or_else(|_| Err(std::io::Error::other("stdin writer panicked")));
            (written, output)
        });

        let output = output?;
        if !output.status.success() {
            return Err(EspeakError::Failed {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        written?;
        Ok(output.stdout)
    }
}

/// espeak-ng reads stdin line by line; the last line is under-processed without a terminator.
fn line_terminated(input: &str) -> Cow<'_, str> {
    if input.ends_with('\n') {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(format!("{input}\n"))
    }
}
