use env_logger::{Builder, Env};

/// Level comes from `RUST_LOG`, default `info`. Output goes to stderr so a
/// `--json` report on stdout stays machine-readable.
pub fn init() {
    let _ = Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();
}
