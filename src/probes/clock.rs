use crate::host::{Host, Invocation, ProbeError};
use crate::parse::regex;
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

pub const HELPER: &str = "check_time";

static SYNCHRONIZED: OnceLock<Regex> = OnceLock::new();

pub async fn query(host: &dyn Host, helper_dir: &Path) -> Result<String, ProbeError> {
    host.run(&Invocation::new(format!("./{HELPER}")).in_dir(helper_dir))
        .await
}

pub fn is_synchronized(output: &str) -> bool {
    regex(&SYNCHRONIZED, r"(?m)Synchronized:.*yes").is_match(output)
}
