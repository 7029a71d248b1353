fn main() {
    if let Err(e) = trackdl_lib::run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
