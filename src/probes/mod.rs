//! One adapter per external tool or pseudo-file. Each adapter knows the
//! exact command line to run and the shape of the output it returns; checks
//! only see typed values.

pub mod clock;
pub mod cpu_bench;
pub mod hdparm;
pub mod lsblk;
pub mod mounts;
pub mod procfs;
pub mod speedtest;
