use env_logger::Builder;
use std::io::Write;

/// Initialize the `env_logger` subscriber with the teacher's format:
/// level, target, file:line, message. Safe to call more than once from
/// tests guarded by a `std::sync::Once`.
pub fn init_log() {
    let mut builder = Builder::from_default_env();
    builder
        .format_timestamp_secs()
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} - {}] [{}:{}] {}",
                record.level(),
                record.target(),
                record.file().unwrap_or("?"),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .is_test(true)
        .try_init()
        .ok();
}
