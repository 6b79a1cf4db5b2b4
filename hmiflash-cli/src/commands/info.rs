//! Image info and port listing command implementations.

use {
    anyhow::{Context, Result},
    console::style,
    hmiflash::{
        ChunkPlan, CommandFrame, FsStorage, TftSource, UploadConfig, auto_detect_port,
        discover_ports,
    },
    std::path::Path,
};

/// What an upload of an image would look like on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ImageInfo {
    pub name: String,
    pub size: u32,
    pub blocks: usize,
    pub last_block: usize,
    pub upload_command: String,
}

impl ImageInfo {
    /// Inspect `path` as it would be uploaded at `baud`.
    pub(crate) fn inspect(path: &Path, baud: u32) -> Result<Self> {
        UploadConfig::new(baud).validate()?;
        let (mut storage, name) = FsStorage::for_file(path)?;
        let source = TftSource::open(&mut storage, &name)
            .with_context(|| format!("Failed to load image {}", path.display()))?;
        let plan = ChunkPlan::new(source.size());

        Ok(Self {
            name,
            size: source.size(),
            blocks: plan.blocks(),
            last_block: plan.last_block(),
            upload_command: CommandFrame::upload_request(source.size(), baud)
                .text()
                .to_string(),
        })
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name,
            "size": self.size,
            "blocks": self.blocks,
            "block_size": hmiflash::BLOCK_SIZE,
            "last_block": self.last_block,
            "upload_command": self.upload_command,
        })
    }
}

/// Info command implementation.
pub(crate) fn cmd_info(file: &Path, baud: u32, json: bool) -> Result<()> {
    let info = ImageInfo::inspect(file, baud)?;

    if json {
        let output = serde_json::json!({
            "ok": true,
            "data": info.to_json(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    eprintln!("{}", style("Image").bold().underlined());
    eprintln!("  Name:        {}", style(&info.name).cyan());
    eprintln!("  Size:        {} bytes", info.size);
    eprintln!(
        "  Blocks:      {} x {} bytes (last block {} bytes)",
        info.blocks,
        hmiflash::BLOCK_SIZE,
        info.last_block
    );
    eprintln!(
        "  Upload:      {} {}",
        style(&info.upload_command).yellow(),
        style(format!("@ {baud} baud")).dim()
    );

    Ok(())
}

/// List ports command implementation.
pub(crate) fn cmd_list_ports(json: bool) -> Result<()> {
    let detected = discover_ports();

    if json {
        let ports: Vec<serde_json::Value> = detected
            .iter()
            .map(|p| {
                serde_json::json!({
                    "name": p.name,
                    "device": p.device.name(),
                    "known": p.device.is_known(),
                    "vid": p.vid,
                    "pid": p.pid,
                    "manufacturer": p.manufacturer,
                    "product": p.product,
                    "serial": p.serial,
                })
            })
            .collect();
        let output = serde_json::json!({
            "ok": true,
            "data": {
                "ports": ports,
            }
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    eprintln!("{}", style("Serial ports").bold().underlined());

    if detected.is_empty() {
        eprintln!("  {}", style("No serial ports found").dim());
        return Ok(());
    }

    for line in hmiflash::format_port_list(&detected) {
        eprintln!("  {} {}", style("•").green(), line);
    }

    if let Ok(auto_port) = auto_detect_port() {
        eprintln!(
            "\n{} Auto-detected: {}",
            style("→").green().bold(),
            style(&auto_port.name).cyan().bold()
        );
    }

    Ok(())
}
