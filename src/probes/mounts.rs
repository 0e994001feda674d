use crate::host::{Host, Invocation, ProbeError};
use std::path::Path;

pub async fn findmnt_source(host: &dyn Host, dir: &Path) -> Result<String, ProbeError> {
    let command = format!("findmnt -n -o SOURCE --target {}", dir.display());
    host.run(&Invocation::new(command)).await
}

pub async fn df_source(host: &dyn Host, dir: &Path) -> Result<String, ProbeError> {
    let command = format!("df --output=source {}", dir.display());
    host.run(&Invocation::new(command)).await
}

/// `findmnt -n` prints the bare source, e.g. `/dev/nvme0n1p2`.
pub fn parse_findmnt(output: &str) -> Option<String> {
    output
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

/// `df --output=source` prints a `Filesystem` header followed by the source.
pub fn parse_df(output: &str) -> Option<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .skip(1)
        .last()
        .map(str::to_string)
}
