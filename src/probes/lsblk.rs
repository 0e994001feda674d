use crate::host::{Host, Invocation, ProbeError};
use crate::parse::ParseError;
use serde::Deserialize;

pub const NVME: &str = "nvme";

#[derive(Debug, Deserialize)]
struct LsblkOutput {
    #[serde(default)]
    blockdevices: Vec<BlockDevice>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BlockDevice {
    pub name: String,
    /// Transport: `nvme`, `sata`, `usb`... Null for partitions and virtual devices.
    #[serde(default)]
    pub tran: Option<String>,
    /// Parent kernel device name, set for partitions.
    #[serde(default)]
    pub pkname: Option<String>,
}

impl BlockDevice {
    pub fn is_nvme(&self) -> bool {
        self.tran.as_deref() == Some(NVME)
    }
}

pub async fn query(host: &dyn Host, device: &str) -> Result<String, ProbeError> {
    host.run(&Invocation::new(format!("lsblk -JO {device}")).checked())
        .await
}

/// First block device listed by `lsblk -JO <device>`.
pub fn parse(json: &str) -> Result<BlockDevice, ParseError> {
    let output: LsblkOutput = serde_json::from_str(json).map_err(|err| ParseError::Malformed {
        tool: "lsblk",
        message: err.to_string(),
    })?;
    output
        .blockdevices
        .into_iter()
        .next()
        .ok_or_else(|| ParseError::Malformed {
            tool: "lsblk",
            message: "no block devices listed".to_string(),
        })
}
