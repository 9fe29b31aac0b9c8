use brain_cli::{run, Cli};
use clap::Parser;

fn main() {
    simple_logger::init_with_level(log::Level::Info).ok();

    #[cfg(unix)]
    reset_sigpipe();

    let cli = Cli::parse();

    if let Err(err) = run(cli) {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

#[cfg(unix)]
fn reset_sigpipe() {
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);
    }
}
