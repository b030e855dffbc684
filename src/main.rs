// Run without a console window on Windows release builds.
#![cfg_attr(all(windows, not(debug_assertions)), windows_subsystem = "windows")]

fn main() {
    if let Err(err) = screenshoter::run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}
