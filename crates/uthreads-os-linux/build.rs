fn main() {
    // Preemption relies on SIGVTALRM and ITIMER_VIRTUAL semantics as Linux
    // implements them; refuse other targets up front.
    let os = std::env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    if os != "linux" {
        panic!(
            "{} needs Linux signal and interval-timer semantics; build for a `*-unknown-linux-*` target.",
            env!("CARGO_PKG_NAME")
        );
    }
}
