use std::process;

fn main() {
    if let Err(err) = graphcsv::app::run() {
        eprintln!("fatal: {err:#}");
        process::exit(1);
    }
}
