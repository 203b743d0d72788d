use log::error;
use std::panic;

pub fn initialize_panic_handler() {
    better_panic::install();

    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        // The log file is often the only trace left of a worker panic
        error!("Panic: {panic_info}");
        log::logger().flush();

        default_hook(panic_info);

        std::process::exit(1);
    }));
}
