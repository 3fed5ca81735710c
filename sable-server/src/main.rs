//! Binary entrypoint for `sable-server`.

mod app;
mod event_loop;
mod ingress;

fn main() {
    // DEBUG in the environment raises the default filter; RUST_LOG still wins when set.
    let default_level = if std::env::var("DEBUG").is_ok_and(|value| !value.is_empty()) {
        "debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    if let Err(error) = app::run() {
        log::error!("failed to start sable-server: {error}");
        std::process::exit(1);
    }
}
