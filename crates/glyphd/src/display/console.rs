use std::io::BufRead;
use std::io::Write;

use async_trait::async_trait;
use linkme::distributed_slice;
use tracing::debug;
use tracing::warn;

use super::DISPLAY_REGISTRY;
use super::DisplayContext;
use super::DisplayDriver;
use super::DisplayError;
use super::DisplayFactoryResult;
use super::DriverLink;
use super::MatrixFrame;

#[distributed_slice(DISPLAY_REGISTRY)]
static CONSOLE_DISPLAY: fn(&DisplayContext) -> DisplayFactoryResult = create_console_display;

fn create_console_display(ctx: &DisplayContext) -> DisplayFactoryResult {
    if ctx.config.display.driver != "console" {
        return Ok(None);
    }
    let display = &ctx.config.display;
    Ok(Some(Box::new(
        ConsoleDisplay::new(display.width, display.height).with_stdin_events(),
    )))
}

/// Renders frames as text. Lines typed on stdin ("change", "aod") are
/// forwarded as hardware events when enabled.
pub struct ConsoleDisplay {
    width: usize,
    height: usize,
    out: Box<dyn Write + Send>,
    stdin_events: bool,
    reader_started: bool,
    device_id: Option<String>,
}

impl ConsoleDisplay {
    pub fn new(width: usize, height: usize) -> Self {
        Self::with_writer(width, height, Box::new(std::io::stdout()))
    }

    pub fn with_writer(width: usize, height: usize, out: Box<dyn Write + Send>) -> Self {
        Self {
            width,
            height,
            out,
            stdin_events: false,
            reader_started: false,
            device_id: None,
        }
    }

    pub fn with_stdin_events(mut self) -> Self {
        self.stdin_events = true;
        self
    }

    /// Reads stdin on a plain thread until it closes.
    fn start_reader(&mut self, link: DriverLink) {
        if self.reader_started {
            return;
        }
        let spawned = std::thread::Builder::new()
            .name("console-events".to_string())
            .spawn(move || {
                for line in std::io::stdin().lock().lines() {
                    let Ok(line) = line else { break };
                    let line = line.trim();
                    if !line.is_empty() {
                        link.hardware_event(line);
                    }
                }
                debug!("stdin closed, no more console events");
            });
        match spawned {
            Ok(_) => self.reader_started = true,
            Err(e) => warn!("Cannot read console events: {}", e),
        }
    }
}

#[async_trait]
impl DisplayDriver for ConsoleDisplay {
    fn name(&self) -> &str {
        "console"
    }

    fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    async fn connect(&mut self, link: DriverLink) -> Result<(), DisplayError> {
        if self.stdin_events {
            self.start_reader(link.clone());
        }
        link.connected();
        Ok(())
    }

    async fn register(&mut self, device_id: &str) -> Result<(), DisplayError> {
        self.device_id = Some(device_id.to_string());
        Ok(())
    }

    async fn push(&mut self, frame: MatrixFrame) -> Result<(), DisplayError> {
        let device_id = self.device_id.as_deref().ok_or(DisplayError::NotRegistered)?;
        write!(self.out, "[{}]\n{}", device_id, frame.to_ascii())
            .and_then(|()| self.out.flush())
            .map_err(|e| DisplayError::Transport(e.to_string()))
    }

    async fn unregister(&mut self) -> Result<(), DisplayError> {
        self.device_id = None;
        Ok(())
    }

    async fn release(&mut self) {
        self.device_id = None;
        if let Err(e) = self.out.flush() {
            debug!("Flushing console output failed: {}", e);
        }
    }
}
