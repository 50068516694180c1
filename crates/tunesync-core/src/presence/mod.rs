//! The outbound side: where the consolidated status ends up.

mod file;

pub use file::FileSink;

use tracing::{debug, info};

use crate::error::Result;
use crate::format::StatusFormatter;
use crate::model::TrackSnapshot;

/// A presence service that shows one short status line.
pub trait PresenceSink: Send {
    fn set_status(&mut self, name: &str) -> Result<()>;
    fn clear_status(&mut self) -> Result<()>;
}

impl<S: PresenceSink + ?Sized> PresenceSink for Box<S> {
    fn set_status(&mut self, name: &str) -> Result<()> {
        (**self).set_status(name)
    }

    fn clear_status(&mut self) -> Result<()> {
        (**self).clear_status()
    }
}

/// Emits the status through the log.
#[derive(Debug, Default)]
pub struct LogSink;

impl PresenceSink for LogSink {
    fn set_status(&mut self, name: &str) -> Result<()> {
        info!("Now playing: {}", name);
        Ok(())
    }

    fn clear_status(&mut self) -> Result<()> {
        info!("Status cleared");
        Ok(())
    }
}

/// Formats snapshots for a sink and drops calls that would not change what it shows.
#[derive(Debug)]
pub struct Publisher<S> {
    sink: S,
    formatter: StatusFormatter,
    current: Option<String>,
}

impl<S: PresenceSink> Publisher<S> {
    pub fn new(sink: S, formatter: StatusFormatter) -> Self {
        Self {
            sink,
            formatter,
            current: None,
        }
    }

    /// Show `track`. Returns whether the sink was called.
    pub fn publish(&mut self, track: &TrackSnapshot) -> Result<bool> {
        let name = self.formatter.format(track);
        if self.current.as_deref() == Some(name.as_str()) {
            return Ok(false);
        }
        self.sink.set_status(&name)?;
        debug!("Status set: {}", name);
        self.current = Some(name);
        Ok(true)
    }

    /// Clear the status. Returns whether the sink was called.
    pub fn clear(&mut self) -> Result<bool> {
        if self.current.is_none() {
            return Ok(false);
        }
        self.sink.clear_status()?;
        self.current = None;
        Ok(true)
    }

    /// The name the sink is currently showing, if any.
    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn formatter(&self) -> &StatusFormatter {
        &self.formatter
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}
