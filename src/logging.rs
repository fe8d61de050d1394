//! Logger bootstrap, following the teacher repo's `env_logger::Builder`
//! setup almost verbatim.

use env_logger::Builder;
use once_cell::sync::OnceCell;
use std::io::Write;

static INIT: OnceCell<()> = OnceCell::new();

pub fn init_log() {
    INIT.get_or_init(|| {
        let mut builder = Builder::from_default_env();
        builder
            .format_timestamp_micros()
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
            .init();
    });
}
