fn main() {
    if let Err(err) = saleslens::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
