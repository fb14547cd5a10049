use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, warn};

use crate::error::ProducerError;
use crate::snapshot::{PageText, SnapshotParser};

/// Source of the payload sent on each scheduled exchange.
///
/// Called once per iteration on the scheduler's thread. Implementations should
/// return within one scheduling interval.
pub trait Producer {
    fn produce(&mut self) -> Result<String, ProducerError>;
}

impl<P: Producer + ?Sized> Producer for Box<P> {
    fn produce(&mut self) -> Result<String, ProducerError> {
        (**self).produce()
    }
}

/// Always produces the same payload.
#[derive(Debug, Clone)]
pub struct FixedProducer {
    payload: String,
}

impl FixedProducer {
    pub fn new(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
        }
    }
}

impl Producer for FixedProducer {
    fn produce(&mut self) -> Result<String, ProducerError> {
        Ok(self.payload.clone())
    }
}

/// Adapter turning a closure into a [`Producer`].
pub struct FnProducer<F> {
    f: F,
}

/// Wrap a closure as a [`Producer`].
pub fn from_fn<F>(f: F) -> FnProducer<F>
where
    F: FnMut() -> Result<String, ProducerError>,
{
    FnProducer { f }
}

impl<F> Producer for FnProducer<F>
where
    F: FnMut() -> Result<String, ProducerError>,
{
    fn produce(&mut self) -> Result<String, ProducerError> {
        (self.f)()
    }
}

/// Runs an external command and sends its trimmed stdout.
///
/// The command owns everything about data collection (browser sessions,
/// scraping); it must print one ready-to-send payload and exit 0.
#[derive(Debug, Clone)]
pub struct CommandProducer {
    program: String,
    args: Vec<String>,
}

impl CommandProducer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl Producer for CommandProducer {
    fn produce(&mut self) -> Result<String, ProducerError> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stderr(Stdio::inherit())
            .output()
            .map_err(|source| ProducerError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(ProducerError::Exit {
                program: self.program.clone(),
                status: output.status,
            });
        }

        let payload = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if payload.is_empty() {
            return Err(ProducerError::Empty);
        }
        debug!(program = %self.program, payload = %payload, "producer command finished");
        Ok(payload)
    }
}

/// Builds a snapshot from a page-text dump refreshed by an external scraper.
#[derive(Debug, Clone)]
pub struct PageTextProducer {
    path: PathBuf,
    parser: SnapshotParser,
}

impl PageTextProducer {
    pub fn new(path: impl AsRef<Path>, agent: &str) -> Result<Self, ProducerError> {
        let parser = SnapshotParser::new(agent)
            .map_err(|err| ProducerError::Other(format!("invalid agent name: {err}")))?;
        Ok(Self {
            path: path.as_ref().to_path_buf(),
            parser,
        })
    }
}

impl Producer for PageTextProducer {
    fn produce(&mut self) -> Result<String, ProducerError> {
        let dump = std::fs::read_to_string(&self.path).map_err(|source| ProducerError::Read {
            path: self.path.clone(),
            source,
        })?;

        let page = PageText::parse(&dump);
        let snapshot = self.parser.snapshot(&page);

        if snapshot.queue_positions.is_empty() {
            warn!(path = %self.path.display(), "no queue positions in page text; using fallback");
        }
        if snapshot.staleness.is_none() {
            warn!(path = %self.path.display(), "no staleness for agent in page text; using fallback");
        }

        Ok(snapshot.to_payload())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn fixed_producer_repeats_payload() {
        let mut producer = FixedProducer::new("1,2,00:00:01");
        assert_eq!(producer.produce().unwrap(), "1,2,00:00:01");
        assert_eq!(producer.produce().unwrap(), "1,2,00:00:01");
    }

    #[test]
    fn closure_producer() {
        let mut calls = 0;
        let mut producer = from_fn(move || {
            calls += 1;
            Ok(format!("{calls},0,00:00:00"))
        });
        assert_eq!(producer.produce().unwrap(), "1,0,00:00:00");
        assert_eq!(producer.produce().unwrap(), "2,0,00:00:00");
    }

    #[test]
    fn boxed_producer_delegates() {
        let mut producer: Box<dyn Producer> = Box::new(FixedProducer::new("x"));
        assert_eq!(producer.produce().unwrap(), "x");
    }

    #[test]
    #[cfg(unix)]
    fn command_producer_trims_stdout() {
        let mut producer = CommandProducer::new(
            "sh",
            vec!["-c".to_string(), "printf '  3,12,1.23:45:01\\n'".to_string()],
        );
        assert_eq!(producer.produce().unwrap(), "3,12,1.23:45:01");
    }

    #[test]
    #[cfg(unix)]
    fn command_producer_reports_failures() {
        let mut failing = CommandProducer::new("sh", vec!["-c".to_string(), "exit 3".to_string()]);
        assert!(matches!(failing.produce(), Err(ProducerError::Exit { .. })));

        let mut silent = CommandProducer::new("sh", vec!["-c".to_string(), "true".to_string()]);
        assert!(matches!(silent.produce(), Err(ProducerError::Empty)));

        let mut missing = CommandProducer::new("serialbridge-no-such-producer", Vec::new());
        assert!(matches!(missing.produce(), Err(ProducerError::Spawn { .. })));
    }

    #[test]
    fn page_text_producer_reads_dump() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[queue]\nFL_English 3\nNOC 12\n[agents]\nAndrew Chulock 1.23:45:01").unwrap();

        let mut producer = PageTextProducer::new(file.path(), "Andrew Chulock").unwrap();
        assert_eq!(producer.produce().unwrap(), "3,12,1.23:45:01");
    }

    #[test]
    fn page_text_producer_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut producer =
            PageTextProducer::new(dir.path().join("missing.txt"), "Andrew Chulock").unwrap();
        assert!(matches!(producer.produce(), Err(ProducerError::Read { .. })));
    }
}
