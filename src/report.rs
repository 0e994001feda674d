use crate::checks::CheckId;
use crate::state::{CheckRecord, Verdict};
use colored::*;

/// Stderr of a command, shown in red beneath whatever is running.
pub fn print_stderr(stderr: &str) {
    eprintln!("{}", format!("stderr:\n{}", stderr.trim_end()).red());
}

pub fn heading(text: &str) {
    println!("\n{}", text.blue().bold());
}

pub fn check_header(id: CheckId) {
    println!("\n{}", format!("==== {id} ====").bold());
}

pub fn print_record(record: &CheckRecord) {
    match &record.verdict {
        Verdict::Pass => println!("{}", "PASSED".green().bold()),
        Verdict::Skip(_) => println!("{}", "PASSED (skipped)".green().bold()),
        Verdict::Fail(_) => println!("{}", "FAILED".red().bold()),
    }

    let output = record.raw_output.trim_end();
    if !output.is_empty() {
        if record.passed() {
            println!("{}", output.green());
        } else {
            println!("{}", output.yellow());
        }
    }

    if let Some(detail) = record.verdict.detail() {
        println!("{}", detail.red());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Summary {
    pub passed: usize,
    pub failed: usize,
}

impl Summary {
    pub fn of(records: &[CheckRecord]) -> Self {
        let passed = records.iter().filter(|r| r.passed()).count();
        Self {
            passed,
            failed: records.len() - passed,
        }
    }

    pub fn line(&self) -> String {
        format!("{} passed, {} failed", self.passed, self.failed)
    }
}

pub fn print_summary(summary: Summary) {
    let line = summary.line();
    if summary.failed == 0 {
        println!("\n{}", line.green().bold());
    } else {
        println!("\n{}", line.red().bold());
    }
}
