#![forbid(unsafe_code)]

fn main() {
    if let Err(error) = storyline::run_from_env() {
        eprintln!("storyline: {error}");
        std::process::exit(error.exit_code());
    }
}
