fn main() {
    if let Err(err) = reaction_paths::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
