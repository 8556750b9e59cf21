#![forbid(unsafe_code)]

fn main() {
    if let Err(error) = mutexmon::run_from_env() {
        eprintln!("mutexmon: {error}");
        std::process::exit(error.exit_code());
    }
}
