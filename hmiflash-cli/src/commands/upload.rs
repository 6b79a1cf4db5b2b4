//! Upload command implementation.

use {
    crate::{Cli, config::Config, get_port, use_fancy_output},
    anyhow::{Context, Result},
    console::style,
    hmiflash::{ChunkPlan, FsStorage, NativePort, SerialConfig, TftSource, UploadConfig, Uploader},
    indicatif::{ProgressBar, ProgressStyle},
    log::debug,
    std::{fs::File, io::BufReader, path::Path, time::Duration},
};

/// Rate the host opens the port at before detection takes over.
const INITIAL_BAUD: u32 = 9600;

/// Upload timing resolved from flags, config and defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct UploadTiming {
    pub ack_timeout: Option<Duration>,
    pub settle_delay: Option<Duration>,
}

impl UploadTiming {
    /// Flags win over the config file.
    pub(crate) fn resolve(
        ack_timeout_ms: Option<u64>,
        settle_ms: Option<u64>,
        config: &Config,
    ) -> Self {
        Self {
            ack_timeout: ack_timeout_ms
                .map(Duration::from_millis)
                .or_else(|| config.upload.ack_timeout()),
            settle_delay: settle_ms
                .map(Duration::from_millis)
                .or_else(|| config.upload.settle_delay()),
        }
    }

    pub(crate) fn apply(self, mut config: UploadConfig) -> UploadConfig {
        if let Some(timeout) = self.ack_timeout {
            config = config.with_ack_timeout(timeout);
        }
        if let Some(delay) = self.settle_delay {
            config = config.with_settle_delay(delay);
        }
        config
    }
}

fn progress_bar(quiet: bool) -> ProgressBar {
    if quiet || !use_fancy_output() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(100);
    #[allow(clippy::unwrap_used)] // Static template string
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );
    pb.set_draw_target(indicatif::ProgressDrawTarget::stderr());
    pb
}

/// Open the image once; the same handle feeds the transfer.
fn open_image(file: &Path) -> Result<TftSource<BufReader<File>>> {
    let (mut storage, name) = FsStorage::for_file(file)?;
    TftSource::open(&mut storage, &name)
        .with_context(|| format!("Failed to load image {}", file.display()))
}

/// Upload command implementation.
pub(crate) fn cmd_upload(
    cli: &Cli,
    config: &Config,
    file: &Path,
    baud: u32,
    timing: UploadTiming,
) -> Result<()> {
    // Reject a bad image before any port is opened
    let mut source = open_image(file)?;
    let size = source.size();
    let name = source.name().to_string();
    let plan = ChunkPlan::new(size);
    let upload_config = timing.apply(UploadConfig::new(baud));
    upload_config.validate()?;
    debug!("Upload config: {upload_config:?}");

    if !cli.quiet {
        eprintln!(
            "{} {} ({} bytes, {} blocks)",
            style("📦").cyan(),
            name,
            size,
            plan.blocks()
        );
    }

    let port_name = get_port(cli, config)?;
    if !cli.quiet {
        eprintln!(
            "{} Using port {} (upload at {} baud)",
            style("🔌").cyan(),
            style(&port_name).bold(),
            baud
        );
    }

    let port = NativePort::open(&SerialConfig::new(&port_name, INITIAL_BAUD))
        .with_context(|| format!("Failed to open serial port {port_name}"))?;
    let mut uploader = Uploader::new(port, upload_config);

    if !cli.quiet {
        eprintln!("{} Waiting for display...", style("⏳").yellow());
    }

    let pb = progress_bar(cli.quiet);
    pb.set_message(name.clone());

    let result = uploader.upload(&mut source, |sent, total| {
        if total > 0 {
            pb.set_position((sent * 100 / total) as u64);
        }
    });

    let report = match result {
        Ok(report) => {
            pb.finish_with_message("done");
            report
        },
        Err(e) => {
            pb.abandon();
            return Err(e).context(format!("Upload of {name} failed"));
        },
    };

    if !cli.quiet {
        eprintln!(
            "\n{} Uploaded {} bytes in {} blocks (display found at {} baud, transferred at {} baud)",
            style("🎉").green().bold(),
            report.bytes_sent,
            report.blocks,
            report.detected_baud,
            report.target_baud
        );
    }

    Ok(())
}
