use std::io::{self, Write};
use std::path::Path;

use async_trait::async_trait;
use env_logger::Builder;
use log::LevelFilter;
use pingora::{
    server::{ListenFds, ShutdownWatch},
    services::Service,
};
use tokio::{
    fs::{create_dir_all, metadata, File, OpenOptions},
    io::{AsyncWriteExt, BufWriter},
    sync::mpsc::{error::SendError, unbounded_channel, UnboundedReceiver, UnboundedSender},
};

use crate::config;

/// `Write` half handed to env_logger; forwards each record to the file sink.
///
/// Once the sink has stopped, records go to stderr instead.
pub struct ChannelWriter {
    sender: UnboundedSender<Vec<u8>>,
}

impl ChannelWriter {
    fn forward(&self, buf: &[u8], fallback: &mut impl Write) -> io::Result<usize> {
        if let Err(SendError(record)) = self.sender.send(buf.to_vec()) {
            fallback.write_all(&record)?;
        }
        Ok(buf.len())
    }
}

impl Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.forward(buf, &mut io::stderr())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Background service appending log records to `log.path`.
pub struct FileLogSink {
    sender: UnboundedSender<Vec<u8>>,
    receiver: UnboundedReceiver<Vec<u8>>,
    config: config::Log,
}

impl FileLogSink {
    pub fn new(config: config::Log) -> Self {
        let (sender, receiver) = unbounded_channel::<Vec<u8>>();
        Self {
            sender,
            receiver,
            config,
        }
    }

    pub fn writer(&self) -> ChannelWriter {
        ChannelWriter {
            sender: self.sender.clone(),
        }
    }

    fn install(&self) {
        Builder::from_env(env_logger::Env::default())
            .filter(None, LevelFilter::Info)
            .target(env_logger::Target::Pipe(Box::new(self.writer())))
            .init();
    }

    async fn open(&self) -> io::Result<BufWriter<File>> {
        if let Some(parent) = Path::new(&self.config.path).parent() {
            if metadata(parent).await.is_err() {
                create_dir_all(parent).await?;
            }
        }

        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.config.path)
            .await?;
        Ok(BufWriter::new(file))
    }
}

/// Install the process logger.
///
/// With a `log` section, records go through a [`FileLogSink`] that must be
/// added to the server; otherwise env_logger writes to stderr.
pub fn init(config: Option<&config::Log>) -> Option<FileLogSink> {
    match config {
        Some(log_cfg) => {
            let sink = FileLogSink::new(log_cfg.clone());
            sink.install();
            Some(sink)
        }
        None => {
            env_logger::init();
            None
        }
    }
}

#[async_trait]
impl Service for FileLogSink {
    async fn start_service(&mut self, _fds: Option<ListenFds>, mut shutdown: ShutdownWatch) {
        let mut file = match self.open().await {
            Ok(file) => file,
            Err(e) => {
                // The logger itself points here, so report on stderr.
                eprintln!("Failed to open log file {}: {e}", self.config.path);
                return;
            }
        };

        loop {
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                },

                data = self.receiver.recv() => {
                    match data {
                        Some(data) => {
                            if let Err(e) = file.write_all(&data).await {
                                eprintln!("Failed to write to log file: {e}");
                            }
                        }
                        None => break,
                    }
                }
            }
        }

        // Later records, such as pre-destroy failures, take the stderr path.
        self.receiver.close();
        while let Some(data) = self.receiver.recv().await {
            if let Err(e) = file.write_all(&data).await {
                eprintln!("Failed to write to log file: {e}");
                break;
            }
        }

        if let Err(e) = file.flush().await {
            eprintln!("Failed to flush log file: {e}");
        }
    }

    fn name(&self) -> &str {
        "log sync"
    }

    fn threads(&self) -> Option<usize> {
        Some(1)
    }
}
