// Command-line entry point; see `annotweave --help`.

fn main() {
    annotweave::cli::run();
}
