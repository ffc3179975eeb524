fn main() {
    if let Err(err) = studyfocus_lib::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
