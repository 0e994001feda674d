//! Prints the kernel's NTP clock status as reported by `ntp_adjtime`.

#[cfg(target_os = "linux")]
fn main() {
    // linux/timex.h
    const STA_NANO: libc::c_int = 0x2000;
    const TIME_ERROR: libc::c_int = 5;

    // SAFETY: timex is plain data; modes == 0 makes the call read-only.
    let mut tx: libc::timex = unsafe { std::mem::zeroed() };
    let state = unsafe { libc::ntp_adjtime(&mut tx) };

    let jitter_unit = if tx.status & STA_NANO != 0 { "ns" } else { "us" };
    let synchronized = state >= 0 && state != TIME_ERROR;

    println!("Max       error: {:>9} (us)", tx.maxerror);
    println!("Estimated error: {:>9} (us)", tx.esterror);
    println!("Clock precision: {:>9} (us)", tx.precision);
    println!("Jitter:          {:>9} ({jitter_unit})", tx.jitter);
    println!(
        "Synchronized:    {:>9}",
        if synchronized { "yes" } else { "no" }
    );
}

#[cfg(not(target_os = "linux"))]
fn main() {
    println!("Synchronized:    {:>9}", "no");
    eprintln!("ntp_adjtime is only available on Linux");
    std::process::exit(1);
}
