fn main() {
    if let Err(e) = apollo::run() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
