pub mod api;
pub mod core;
pub mod recorder;

use once_cell::sync::OnceCell;

static LOGGER: OnceCell<()> = OnceCell::new();

pub fn init_logging() {
    LOGGER.get_or_init(|| {
        #[cfg(target_os = "android")]
        {
            android_logger::init_once(
                android_logger::Config::default()
                    .with_max_level(log::LevelFilter::Debug)
                    .with_tag("person_clip"),
            );
        }

        #[cfg(not(target_os = "android"))]
        {
            // 宿主进程可能已经装好了 logger
            let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
                .try_init();
        }
    });
}
