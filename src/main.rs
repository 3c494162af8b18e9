fn main() {
    if let Err(err) = obsidian::cli::main() {
        eprintln!("❌ Error: {err}");
        std::process::exit(1);
    }
}
