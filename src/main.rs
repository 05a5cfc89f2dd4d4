fn main() {
    if let Err(err) = enphase_telemetry_api::app::run() {
        eprintln!("application startup failed: {err}");
        std::process::exit(1);
    }
}
